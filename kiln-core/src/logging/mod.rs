//! Structured command log.
//!
//! The drain engine records what it does to a [`LogCollector`]: drains
//! starting and finishing, commands being admitted and dispatched, payloads
//! released, fatal conditions. Each [`LogEvent`] carries the queue, command
//! and event IDs it concerns, so a collector can answer "what happened to
//! this command" after the fact.
//!
//! This is separate from `tracing` diagnostics, which the engine emits
//! alongside.

mod collector;
mod event;

pub use collector::{
    BufferedCollector, DEFAULT_BUFFER_CAPACITY, LogCollector, LogSubscriber, NullCollector,
};
pub use event::{LogCategory, LogEvent, LogLevel};
