//! # Watchtower Telemetry
//!
//! Logging and metrics setup shared by the hub and validator binaries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use watchtower_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::for_service("watchtower-hub"))?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `watchtower` | Service name in startup logs |
//! | `WT_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `WT_JSON_LOGS` | `false` | JSON log lines |
//! | `WT_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(clippy::all)]

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{encode_metrics, register_metrics, HistogramTimer};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global tracing subscriber.
///
/// Returns a guard to hold for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first, they do not depend on the subscriber
    register_metrics()?;
    init_tracing(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that marks the telemetry lifetime. Logs on drop.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
