//! Command log records.
//!
//! A [`LogEvent`] is one structured entry in the drain engine's command log,
//! correlated with the queue, command and event it concerns.

use crate::types::{CommandId, EventId, QueueId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::time::{SystemTime, UNIX_EPOCH};

/// Log severity level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a log level, accepting `warning` for `Warn`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or("invalid log level")
    }
}

/// What part of the engine a log event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// Drain start and finish.
    Queue,
    /// Admission and dispatch of a single command.
    Command,
    /// Event transitions and callbacks.
    Event,
    /// Calls into a device backend.
    Device,
    /// Payload release.
    Memory,
    /// Fatal conditions and engine internals.
    System,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Command => "command",
            Self::Event => "event",
            Self::Device => "device",
            Self::Memory => "memory",
            Self::System => "system",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured log event with correlation IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Sequence number, assigned by the collector.
    pub id: u64,
    /// Nanoseconds since the UNIX epoch.
    pub timestamp_ns: u64,
    pub level: LogLevel,
    pub category: LogCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<QueueId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<CommandId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogEvent {
    /// Create a log event stamped with the current time.
    pub fn new(level: LogLevel, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            timestamp_ns: current_timestamp_ns(),
            level,
            category,
            queue_id: None,
            command_id: None,
            event_id: None,
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    pub fn trace(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Trace, category, message)
    }

    pub fn debug(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, category, message)
    }

    pub fn info(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, category, message)
    }

    pub fn warn(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, category, message)
    }

    pub fn error(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, category, message)
    }

    pub fn with_queue_id(mut self, queue_id: QueueId) -> Self {
        self.queue_id = Some(queue_id);
        self
    }

    pub fn with_command_id(mut self, command_id: CommandId) -> Self {
        self.command_id = Some(command_id);
        self
    }

    /// Set the event ID if there is one.
    pub fn with_event_id(mut self, event_id: Option<EventId>) -> Self {
        self.event_id = event_id;
        self
    }

    /// Attach a structured field. Strings, integers and booleans all convert.
    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Timestamp in ISO 8601 with millisecond precision.
    pub fn timestamp_iso(&self) -> String {
        let secs = (self.timestamp_ns / 1_000_000_000) as i64;
        let nanos = (self.timestamp_ns % 1_000_000_000) as u32;
        chrono::DateTime::from_timestamp(secs, nanos)
            .map(|at| at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            .unwrap_or_else(|| format!("{}ns", self.timestamp_ns))
    }

    /// Render as a single human-readable line.
    ///
    /// `2026-01-01T00:00:00.000Z INFO  command queue_3 command_9 event_12 Command complete {k=v}`
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "{} {:<5} {}",
            self.timestamp_iso(),
            self.level.as_str().to_uppercase(),
            self.category
        );
        let ids = [
            self.queue_id.map(|id| id.to_string()),
            self.command_id.map(|id| id.to_string()),
            self.event_id.map(|id| id.to_string()),
        ];
        for id in ids.into_iter().flatten() {
            let _ = write!(line, " {id}");
        }
        let _ = write!(line, " {}", self.message);

        if !self.fields.is_empty() {
            let mut fields: Vec<_> = self.fields.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let rendered: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
            let _ = write!(line, " {{{}}}", rendered.join(", "));
        }
        line
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_line())
    }
}

fn current_timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parsing() {
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!("error".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!(LogLevel::parse("loud"), None);
        assert!(LogLevel::Debug < LogLevel::Warn);
    }

    #[test]
    fn format_line_includes_correlation() {
        let event = LogEvent::info(LogCategory::Command, "Command complete")
            .with_queue_id(QueueId::from_raw(3))
            .with_command_id(CommandId::from_raw(9))
            .with_event_id(Some(EventId::from_raw(12)))
            .with_field("command_type", "marker")
            .with_field("released", 2u64)
            .with_field("implicit", false);

        let line = event.format_line();
        assert!(line.contains(" INFO  command queue_3 command_9 event_12 Command complete "));
        assert!(line.ends_with(r#"{command_type="marker", implicit=false, released=2}"#));
        assert_eq!(event.to_string(), line);
    }

    #[test]
    fn serialization_skips_missing_ids() {
        let event = LogEvent::error(LogCategory::System, "Out-of-order queue");
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("queue_id").is_none());
        assert_eq!(json["category"], "system");
        assert_eq!(json["level"], "error");

        let parsed: LogEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.message, "Out-of-order queue");
    }
}
