//! Kiln Executor - command queue drain engine.
//!
//! This crate turns enqueued commands into device work:
//! - Dependency resolution across queues into ready batches
//! - Per-kind dispatch to the device backend
//! - Event completion, callback delivery and resource release
//! - A queue registry with a single drain entry point
//! - Tracing subscriber setup

pub mod config;
pub mod dispatch;
pub mod executor;
pub mod observability;
pub mod resolver;

pub use config::{CursorPolicy, ExecutorConfig};
pub use executor::{DrainReport, Executor, StatsSnapshot};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{CursorPolicy, ExecutorConfig};
    pub use crate::dispatch::{DispatchSummary, Dispatcher, ReleaseSummary};
    pub use crate::executor::{DrainReport, Executor, ExecutorStats, StatsSnapshot};
    pub use crate::observability::{LogFormat, TracingConfig, init_tracing};
    pub use crate::resolver::{Cursor, ReadyBatch, ResolveState, Resolver, StepOutcome};
}
