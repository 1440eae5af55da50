//! Process-wide diagnostics setup.
//!
//! The engine emits `tracing` events and spans; embedders either install
//! their own subscriber or call [`init_tracing`] once at startup.
//!
//! [`TracingConfig`] deserializes alongside the rest of an embedder's
//! configuration, or comes from `KILN_LOG_*` variables via
//! [`TracingConfig::from_env`].
//!
//! # Example
//!
//! ```ignore
//! use kiln_executor::observability::{TracingConfig, init_tracing};
//!
//! init_tracing(&TracingConfig::from_env())?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::init_tracing;
