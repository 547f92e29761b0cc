//! # Watchtower Hub Runtime
//!
//! Wires configuration, storage, geolocation and the coordinator into a
//! running server.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then env / flags)
//! 2. Open the storage backend
//! 3. Build the coordinator (registry + callback table)
//! 4. Spawn the round scheduler and callback expiry tasks
//! 5. Serve HTTP / WebSocket until Ctrl+C
//!
//! ## Modular Structure
//!
//! - `config` - `HubConfig` and command-line overrides
//! - `server` - router: health, metrics, validator sockets
//! - `api` - target management REST endpoints
//! - `storage` - in-memory and RocksDB backends

pub mod api;
pub mod config;
pub mod server;
pub mod storage;

use anyhow::{Context, Result};
use hub_coordinator::{expiry_task, scheduler_task, Geolocator, HubCoordinator, NoopGeolocator};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{GeolocationConfig, HubConfig};
use crate::server::{build_router, AppState};
use crate::storage::{open_storage, Storage};

/// The hub runtime owning the coordinator and its background tasks.
pub struct HubRuntime {
    config: HubConfig,
    coordinator: Arc<HubCoordinator>,
    storage: Storage,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl HubRuntime {
    /// Build a runtime from validated configuration.
    pub fn new(config: HubConfig) -> Result<Self> {
        let storage = open_storage(&config.storage).context("Failed to open storage")?;
        Self::with_storage(config, storage)
    }

    /// Build a runtime over an existing storage backend.
    pub fn with_storage(config: HubConfig, storage: Storage) -> Result<Self> {
        let geolocator = build_geolocator(&config.geolocation)?;
        let coordinator = HubCoordinator::new(
            config.coordinator.clone(),
            Arc::clone(&storage.repository),
            geolocator,
        )
        .context("Invalid coordinator configuration")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            coordinator: Arc::new(coordinator),
            storage,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<HubCoordinator> {
        &self.coordinator
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Router serving every HTTP and WebSocket route.
    pub fn router(&self) -> axum::Router {
        build_router(AppState {
            coordinator: Arc::clone(&self.coordinator),
            catalog: Arc::clone(&self.storage.catalog),
            websocket: self.config.server.websocket.clone(),
            api: self.config.api.clone(),
        })
    }

    /// Spawn the round scheduler and callback expiry tasks.
    ///
    /// Both stop when [`HubRuntime::shutdown`] is called.
    pub fn start_background_tasks(&self) {
        let coordinator = Arc::clone(&self.coordinator);
        let mut scheduler_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = scheduler_task(coordinator) => {}
                _ = scheduler_shutdown.changed() => {
                    info!("[scheduler] Shutdown signal received");
                }
            }
        });

        let callbacks = Arc::clone(self.coordinator.callbacks());
        let sweep_interval = self.config.coordinator.expiry_sweep_interval;
        let mut expiry_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = expiry_task(callbacks, sweep_interval) => {}
                _ = expiry_shutdown.changed() => {
                    info!("[expiry] Shutdown signal received");
                }
            }
        });

        info!(
            round_interval = ?self.config.coordinator.round_interval,
            run_on_start = self.config.coordinator.run_on_start,
            "Background tasks started"
        );
    }

    /// Serve on `listener` until shutdown is signalled.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr().context("Listener has no address")?;
        info!(addr = %addr, "Hub listening");

        let mut shutdown = self.shutdown_rx.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .context("HTTP server failed")
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
    }
}

#[cfg(feature = "geolocation")]
fn build_geolocator(config: &GeolocationConfig) -> Result<Arc<dyn Geolocator>> {
    if !config.enabled {
        return Ok(Arc::new(NoopGeolocator));
    }
    let geolocator = hub_coordinator::IpApiGeolocator::new(config.endpoint.clone(), config.timeout)
        .context("Failed to build geolocation client")?;
    Ok(Arc::new(geolocator))
}

#[cfg(not(feature = "geolocation"))]
fn build_geolocator(config: &GeolocationConfig) -> Result<Arc<dyn Geolocator>> {
    if config.enabled {
        tracing::warn!("Built without geolocation support; validator locations will be Unknown");
    }
    Ok(Arc::new(NoopGeolocator))
}

/// Grace period for open connections after shutdown is signalled.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
