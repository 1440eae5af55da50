//! Drain engine configuration.

use kiln_core::error::{KilnError, Result};
use kiln_core::fatal::FatalAction;
use kiln_core::logging::DEFAULT_BUFFER_CAPACITY;
use serde::{Deserialize, Serialize};

/// Where the resolver cursor goes after scanning a blocked wait-list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Follow the last non-satisfied entry of the wait-list.
    #[default]
    LastBlocking,
    /// Follow the first non-satisfied entry of the wait-list.
    FirstBlocking,
}

impl CursorPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "last_blocking" | "last" => Some(Self::LastBlocking),
            "first_blocking" | "first" => Some(Self::FirstBlocking),
            _ => None,
        }
    }
}

/// Configuration for an [`Executor`](crate::Executor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Reaction to conditions the engine cannot continue from.
    #[serde(default)]
    pub fatal_action: FatalAction,
    /// Cursor selection when a wait-list has several blocking entries.
    #[serde(default)]
    pub cursor_policy: CursorPolicy,
    /// Capacity of the executor's command log.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_log_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            fatal_action: FatalAction::default(),
            cursor_policy: CursorPolicy::default(),
            log_capacity: default_log_capacity(),
        }
    }
}

impl ExecutorConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `KILN_FATAL_ACTION`: `abort` or `panic`
    /// - `KILN_CURSOR_POLICY`: `last_blocking` or `first_blocking`
    /// - `KILN_LOG_CAPACITY`: command log capacity
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fatal_action = std::env::var("KILN_FATAL_ACTION")
            .ok()
            .and_then(|s| FatalAction::parse(&s))
            .unwrap_or(defaults.fatal_action);

        let cursor_policy = std::env::var("KILN_CURSOR_POLICY")
            .ok()
            .and_then(|s| CursorPolicy::parse(&s))
            .unwrap_or(defaults.cursor_policy);

        let log_capacity = std::env::var("KILN_LOG_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.log_capacity);

        Self {
            fatal_action,
            cursor_policy,
            log_capacity,
        }
    }

    pub fn with_fatal_action(mut self, action: FatalAction) -> Self {
        self.fatal_action = action;
        self
    }

    pub fn with_cursor_policy(mut self, policy: CursorPolicy) -> Self {
        self.cursor_policy = policy;
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Check the configuration for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.log_capacity == 0 {
            return Err(KilnError::InvalidConfig {
                field: "log_capacity".to_string(),
                cause: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
