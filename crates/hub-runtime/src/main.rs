//! Watchtower hub executable.
//!
//! ```bash
//! # In-memory store, defaults
//! watchtower-hub
//!
//! # Config file plus overrides
//! watchtower-hub --config hub.toml --port 9000 --run-on-start
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use hub_runtime::config::HubArgs;
use hub_runtime::{HubRuntime, SHUTDOWN_GRACE};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use watchtower_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = HubArgs::parse();

    let _telemetry = init_telemetry(TelemetryConfig::for_service("watchtower-hub"))
        .context("Failed to initialize telemetry")?;

    let config = args.into_config().context("Invalid configuration")?;

    info!("===========================================");
    info!("  Watchtower Hub v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        storage = ?config.storage.backend,
        round_interval = ?config.coordinator.round_interval,
        reward_per_check = config.coordinator.reward_per_check,
        "Configuration loaded"
    );

    let addr = config.bind_addr();
    let runtime = Arc::new(HubRuntime::new(config)?);
    runtime.start_background_tasks();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let server = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.serve(listener).await })
    };

    info!("Hub is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown();
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => info!("Shutdown complete"),
        Ok(Ok(Err(e))) => error!(error = %e, "Server exited with error"),
        Ok(Err(e)) => error!(error = %e, "Server task failed"),
        Err(_) => info!("Open connections dropped after grace period"),
    }

    Ok(())
}
