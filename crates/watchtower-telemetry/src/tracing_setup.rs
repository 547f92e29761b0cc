//! `tracing` subscriber setup.
//!
//! Builds a registry with an `EnvFilter` and either a pretty or a JSON fmt
//! layer, depending on configuration.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::{TelemetryConfig, TelemetryError};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set or the filter directive is
/// invalid.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    tracing_subscriber::registry()
        .with(fmt_layer(config))
        .with(env_filter)
        .try_init()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        json = config.json_logs,
        "Tracing initialized"
    );

    Ok(())
}

fn fmt_layer(config: &TelemetryConfig) -> Option<BoxedLayer> {
    if !config.console_output {
        return None;
    }

    let layer = if config.json_logs {
        // JSON output for containers/production
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        // Pretty output for development
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true)
            .boxed()
    };

    Some(layer)
}
