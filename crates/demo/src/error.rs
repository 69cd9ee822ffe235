//! Startup errors for the demo binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("invalid resilience configuration: {0}")]
    Config(#[from] resilience::ConfigError),

    #[error("failed to install tracing subscriber: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
