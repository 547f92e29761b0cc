//! Watchtower validator executable.
//!
//! ```bash
//! # Create an identity
//! watchtower-validator keygen --env-file .env
//!
//! # Run against a hub
//! PRIVATE_KEY=[...] watchtower-validator --hub-url ws://hub.example:8081
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use shared_crypto::Ed25519KeyPair;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use validator_node::keys::{env_line, write_env_file};
use validator_node::{load_or_generate, Cli, Command, HttpProber, KeySource, ValidatorClient};
use watchtower_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Keygen { env_file }) = cli.command {
        let keypair = Ed25519KeyPair::generate();
        println!("Public key: {}", keypair.public_key());
        match env_file {
            Some(path) => {
                write_env_file(&keypair, &path)?;
                println!("Secret key written to {}", path.display());
            }
            None => print!("{}", env_line(&keypair)),
        }
        return Ok(());
    }

    let _telemetry = init_telemetry(TelemetryConfig::for_service("watchtower-validator"))
        .context("Failed to initialize telemetry")?;

    let config = cli.run;
    let (keypair, source) = load_or_generate(config.private_key.as_deref());
    if source == KeySource::Generated {
        warn!("Using an ephemeral identity; run `watchtower-validator keygen` to keep one");
    }
    info!(
        public_key = %keypair.public_key(),
        hub_url = %config.hub_url,
        "Starting validator"
    );

    let prober = HttpProber::new(config.probe_timeout).context("Failed to build HTTP client")?;
    let client = ValidatorClient::new(config, keypair, Arc::new(prober));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task = tokio::spawn(async move { client.run(shutdown_rx).await });

    tokio::select! {
        result = &mut task => return result.context("Validator task failed")?,
        _ = tokio::signal::ctrl_c() => {}
    }

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    task.await.context("Validator task failed")??;
    Ok(())
}
