//! Opaque address types forwarded to device backends.
//!
//! The engine never dereferences these values. A backend decides what an
//! address means: a host virtual address, an offset into a device heap, or
//! a handle into its own allocation table.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_ptr {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            /// The null address.
            pub const NULL: Self = Self(0);

            /// Wrap a raw address.
            #[must_use]
            pub const fn new(addr: usize) -> Self {
                Self(addr)
            }

            /// Get the raw address.
            #[must_use]
            pub const fn addr(&self) -> usize {
                self.0
            }

            /// Check if this is the null address.
            #[must_use]
            pub const fn is_null(&self) -> bool {
                self.0 == 0
            }

            /// Address `by` bytes past this one.
            #[must_use]
            pub const fn offset(&self, by: usize) -> Self {
                Self(self.0.wrapping_add(by))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

define_ptr!(
    /// Address in host memory.
    HostPtr
);

define_ptr!(
    /// Address of a device-side allocation.
    DevicePtr
);

define_ptr!(
    /// Shared virtual memory address, identical on host and device.
    SvmPtr
);

/// A 3-component extent or origin, in bytes for x and rows/slices for y/z.
pub type Rect3 = [usize; 3];

/// Geometry of a rectangular transfer between host and device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectTransfer {
    /// Origin inside the device-side buffer.
    pub buffer_origin: Rect3,
    /// Origin inside the host-side region.
    pub host_origin: Rect3,
    /// Extent of the transfer.
    pub region: Rect3,
    /// Row pitch of the device-side buffer.
    pub buffer_row_pitch: usize,
    /// Slice pitch of the device-side buffer.
    pub buffer_slice_pitch: usize,
    /// Row pitch of the host-side region.
    pub host_row_pitch: usize,
    /// Slice pitch of the host-side region.
    pub host_slice_pitch: usize,
}

impl RectTransfer {
    /// A transfer whose host and device sides share origin and pitches.
    ///
    /// Image reads and writes are described this way: the host image is laid
    /// out exactly like the device image.
    pub fn symmetric(origin: Rect3, region: Rect3, row_pitch: usize, slice_pitch: usize) -> Self {
        Self {
            buffer_origin: origin,
            host_origin: origin,
            region,
            buffer_row_pitch: row_pitch,
            buffer_slice_pitch: slice_pitch,
            host_row_pitch: row_pitch,
            host_slice_pitch: slice_pitch,
        }
    }

    /// Number of bytes covered by the region.
    pub fn byte_count(&self) -> usize {
        self.region[0] * self.region[1] * self.region[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_offset() {
        assert!(DevicePtr::NULL.is_null());
        let p = HostPtr::new(0x1000).offset(0x20);
        assert_eq!(p.addr(), 0x1020);
        assert_eq!(p.to_string(), "0x1020");
    }

    #[test]
    fn symmetric_transfer_mirrors_both_sides() {
        let t = RectTransfer::symmetric([4, 1, 0], [16, 8, 1], 64, 512);
        assert_eq!(t.buffer_origin, t.host_origin);
        assert_eq!(t.buffer_row_pitch, t.host_row_pitch);
        assert_eq!(t.buffer_slice_pitch, t.host_slice_pitch);
        assert_eq!(t.byte_count(), 128);
    }
}
