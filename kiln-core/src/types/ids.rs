//! Strongly-typed identifiers for runtime objects.
//!
//! Identifiers are allocated from process-wide counters so that objects
//! created on different threads never collide. They carry no ownership.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Allocate the next identifier from the process-wide counter.
            #[must_use]
            pub fn next() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Create an identifier from a raw value.
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw identifier value.
            #[must_use]
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// Identifier of a command queue.
    QueueId,
    "queue"
);

define_id!(
    /// Identifier of a completion event.
    EventId,
    "event"
);

define_id!(
    /// Identifier of an enqueued command node.
    CommandId,
    "command"
);

define_id!(
    /// Identifier of a compute device.
    DeviceId,
    "device"
);

define_id!(
    /// Identifier of a memory object (buffer or image).
    MemId,
    "mem"
);

define_id!(
    /// Identifier of a kernel object.
    KernelId,
    "kernel"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = QueueId::next();
        let b = QueueId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn display_uses_prefix() {
        assert_eq!(EventId::from_raw(3).to_string(), "event_3");
        assert_eq!(QueueId::from(7).to_string(), "queue_7");
        assert_eq!(CommandId::from_raw(11).as_u64(), 11);
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&MemId::from_raw(42)).unwrap();
        assert_eq!(json, "42");
    }
}
