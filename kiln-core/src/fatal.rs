//! Unrecoverable engine conditions.
//!
//! Some configurations are not implemented by the drain engine at all: an
//! out-of-order queue, a command kind it cannot execute, SVM mapping on a
//! device without unified memory. Reaching one of them is not an error a
//! caller can handle. The engine logs the condition and terminates according
//! to the configured [`FatalAction`].

use crate::command::CommandType;
use crate::types::{CommandId, EventId, QueueId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A condition the engine cannot continue from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalCondition {
    /// A drain was requested on a queue with out-of-order execution enabled.
    OutOfOrderQueue { queue_id: QueueId },
    /// A ready command has a kind the dispatcher does not execute.
    UnsupportedCommand {
        command_id: CommandId,
        command_type: CommandType,
    },
    /// SVM map on a device whose map is not a no-op.
    SvmMapUnsupported { command_id: CommandId },
    /// SVM unmap on a device whose unmap is not a no-op.
    SvmUnmapUnsupported { command_id: CommandId },
    /// A blocking dependency belongs to a queue that no longer exists.
    OrphanedDependency {
        event_id: EventId,
        queue_id: QueueId,
    },
}

impl FatalCondition {
    /// Short machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfOrderQueue { .. } => "out_of_order_queue",
            Self::UnsupportedCommand { .. } => "unsupported_command",
            Self::SvmMapUnsupported { .. } => "svm_map_unsupported",
            Self::SvmUnmapUnsupported { .. } => "svm_unmap_unsupported",
            Self::OrphanedDependency { .. } => "orphaned_dependency",
        }
    }
}

impl fmt::Display for FatalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrderQueue { queue_id } => {
                write!(f, "out-of-order execution is not supported ({queue_id})")
            }
            Self::UnsupportedCommand {
                command_id,
                command_type,
            } => write!(f, "unsupported command type {command_type} ({command_id})"),
            Self::SvmMapUnsupported { command_id } => {
                write!(f, "SVM map requires unified memory ({command_id})")
            }
            Self::SvmUnmapUnsupported { command_id } => {
                write!(f, "SVM unmap requires unified memory ({command_id})")
            }
            Self::OrphanedDependency { event_id, queue_id } => write!(
                f,
                "{event_id} blocks the drain but its queue {queue_id} is gone"
            ),
        }
    }
}

/// Failure code given to events whose commands were cut short when a fatal
/// condition unwound a drain under [`FatalAction::Panic`].
pub const ABANDONED_EVENT_CODE: i32 = -1;

/// How the process reacts to a fatal condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalAction {
    /// `std::process::abort()`.
    #[default]
    Abort,
    /// Panic on the draining thread.
    Panic,
}

impl FatalAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "abort" => Some(Self::Abort),
            "panic" => Some(Self::Panic),
            _ => None,
        }
    }
}

/// Log `condition` and terminate.
#[cold]
pub fn raise_fatal(condition: FatalCondition, action: FatalAction) -> ! {
    tracing::error!(
        kind = condition.kind(),
        action = ?action,
        "Fatal engine condition: {condition}"
    );
    match action {
        FatalAction::Panic => panic!("fatal engine condition: {condition}"),
        FatalAction::Abort => std::process::abort(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_action() {
        assert_eq!(FatalAction::parse("Abort"), Some(FatalAction::Abort));
        assert_eq!(FatalAction::parse("panic"), Some(FatalAction::Panic));
        assert_eq!(FatalAction::parse("exit"), None);
        assert_eq!(FatalAction::default(), FatalAction::Abort);
    }

    #[test]
    fn condition_display() {
        let cond = FatalCondition::UnsupportedCommand {
            command_id: CommandId::from_raw(4),
            command_type: CommandType::Barrier,
        };
        assert_eq!(cond.kind(), "unsupported_command");
        assert!(cond.to_string().contains("barrier"));
    }

    #[test]
    #[should_panic(expected = "out-of-order execution is not supported")]
    fn panic_action_panics() {
        raise_fatal(
            FatalCondition::OutOfOrderQueue {
                queue_id: QueueId::from_raw(1),
            },
            FatalAction::Panic,
        );
    }
}
