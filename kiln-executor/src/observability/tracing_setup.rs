//! Tracing subscriber installation.

use anyhow::{Context, Result};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use super::{LogFormat, TracingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global tracing subscriber described by `config`.
///
/// Fails on malformed filter directives or if a global subscriber is
/// already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("Invalid log filter '{}'", config.filter))?;

    tracing_subscriber::registry()
        .with(output_layer(config))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(format = %config.format, filter = %config.filter, "Tracing initialized");
    Ok(())
}

fn output_layer(config: &TracingConfig) -> BoxedLayer {
    let span_events = if config.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = fmt::layer()
        .with_file(config.location)
        .with_line_number(config.location)
        .with_thread_ids(config.thread_ids)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}
