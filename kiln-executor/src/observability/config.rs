//! Tracing configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, event fields flattened.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the process-wide tracing subscriber is set up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `info,kiln_executor::resolver=trace`.
    pub filter: String,
    /// Source file and line on every event.
    pub location: bool,
    pub thread_ids: bool,
    /// Emit an event when a drain span closes, with its duration.
    pub span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: "info".to_string(),
            location: false,
            thread_ids: false,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Read configuration from the environment.
    ///
    /// - `KILN_LOG_FORMAT`: `json`, `pretty` or `compact`
    /// - `KILN_LOG_LEVEL`, else `RUST_LOG`: filter directives
    /// - `KILN_LOG_LOCATION`, `KILN_LOG_THREAD_IDS`, `KILN_LOG_SPANS`: `1` or
    ///   `true` to enable
    ///
    /// Anything unset or unparsable keeps its default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            format: env::var("KILN_LOG_FORMAT")
                .ok()
                .and_then(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            filter: env::var("KILN_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.filter),
            location: env_flag("KILN_LOG_LOCATION").unwrap_or(defaults.location),
            thread_ids: env_flag("KILN_LOG_THREAD_IDS").unwrap_or(defaults.thread_ids),
            span_events: env_flag("KILN_LOG_SPANS").unwrap_or(defaults.span_events),
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_location(mut self, location: bool) -> Self {
        self.location = location;
        self
    }

    pub fn with_thread_ids(mut self, thread_ids: bool) -> Self {
        self.thread_ids = thread_ids;
        self
    }

    pub fn with_span_events(mut self, span_events: bool) -> Self {
        self.span_events = span_events;
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
