//! Error types for kiln.
//!
//! Errors returned here are the recoverable ones: a caller handed the engine
//! something malformed, and nothing was mutated. Configurations the engine
//! does not implement are not errors; see [`crate::fatal`].

use crate::event::EventStatus;
use crate::types::{EventId, MemId, QueueId};
use thiserror::Error;

/// The main error type for kiln operations.
#[derive(Error, Debug)]
pub enum KilnError {
    // =========================================================================
    // Queue Errors (E001-E099)
    // =========================================================================
    /// The queue handle does not refer to a live queue.
    #[error("E001: Invalid command queue {queue_id}")]
    InvalidCommandQueue {
        /// The handle that failed to resolve.
        queue_id: QueueId,
    },

    /// A queue with this identifier is already registered.
    #[error("E002: Command queue {queue_id} is already registered")]
    QueueExists {
        /// The duplicate identifier.
        queue_id: QueueId,
    },

    // =========================================================================
    // Event Errors (E100-E199)
    // =========================================================================
    /// An event was asked to move backwards or out of a terminal state.
    #[error("E101: Invalid transition for {event_id}: {from} -> {to}")]
    InvalidEventTransition {
        /// The event being transitioned.
        event_id: EventId,
        /// Status before the transition.
        from: EventStatus,
        /// Requested status.
        to: EventStatus,
    },

    // =========================================================================
    // Memory Errors (E300-E399)
    // =========================================================================
    /// The mapping is not linked into the memory object's mapping list.
    #[error("E301: Mapping not found on {mem_id}")]
    MappingNotFound {
        /// The memory object that was searched.
        mem_id: MemId,
    },

    // =========================================================================
    // Configuration Errors (E900-E999)
    // =========================================================================
    /// A configuration value is out of range.
    #[error("E901: Invalid configuration for '{field}': {cause}")]
    InvalidConfig {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        cause: String,
    },
}

impl KilnError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCommandQueue { .. } => "E001",
            Self::QueueExists { .. } => "E002",
            Self::InvalidEventTransition { .. } => "E101",
            Self::MappingNotFound { .. } => "E301",
            Self::InvalidConfig { .. } => "E901",
        }
    }

    /// Check if this error is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

/// Result type alias using `KilnError`.
pub type Result<T> = std::result::Result<T, KilnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_correct() {
        let err = KilnError::InvalidCommandQueue {
            queue_id: QueueId::from_raw(4),
        };
        assert_eq!(err.code(), "E001");

        let err = KilnError::MappingNotFound {
            mem_id: MemId::from_raw(1),
        };
        assert_eq!(err.code(), "E301");
    }

    #[test]
    fn error_display() {
        let err = KilnError::InvalidEventTransition {
            event_id: EventId::from_raw(9),
            from: EventStatus::Complete,
            to: EventStatus::Running,
        };
        let msg = err.to_string();
        assert!(msg.contains("E101"));
        assert!(msg.contains("event_9"));
        assert!(msg.contains("complete -> running"));
    }

    #[test]
    fn config_errors() {
        assert!(
            KilnError::InvalidConfig {
                field: "log_capacity".to_string(),
                cause: "must be positive".to_string(),
            }
            .is_config_error()
        );
        assert!(
            !KilnError::InvalidCommandQueue {
                queue_id: QueueId::from_raw(1)
            }
            .is_config_error()
        );
    }
}
