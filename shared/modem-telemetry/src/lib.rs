//! Modem Telemetry
//!
//! Log initialisation and lightweight in-process metrics for the GSM modem
//! library and its tools.

mod config;
mod tracing_setup;
mod metrics;

pub use config::TelemetryConfig;
pub use tracing_setup::init_tracing;
pub use metrics::{Counter, Histogram, Gauge, MetricsSnapshot};

/// Initialize logging for a tool using environment configuration
pub fn init(service_name: &str) -> Result<TelemetryConfig, TelemetryError> {
    let mut config = TelemetryConfig::from_env();
    config.service_name = service_name.to_string();
    init_tracing(service_name, &config)?;
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Tracing initialization failed: {0}")]
    TracingInit(String),
}
