//! Hub Coordinator - validator coordination engine for the uptime hub.
//!
//! Validators connect over a WebSocket, prove ownership of an Ed25519 key,
//! and are then asked on every round to probe each active website. Their
//! signed replies become observations and payout credits.
//!
//! # Architecture
//!
//! ```text
//!  validator sockets                         storage
//!        │                                      ▲
//!  ┌─────┴──────────────┐              ┌────────┴─────────────┐
//!  │ ws::WebSocketHandler│             │ MonitoringRepository │
//!  └─────┬──────────────┘              └────────┬─────────────┘
//!        │ route()                              │
//!  ┌─────┴──────────────────────────────────────┴───────┐
//!  │                  HubCoordinator                    │
//!  │  signup ─► ValidatorRegistry ◄─ scheduler_task     │
//!  │  results ◄─ CallbackTable ◄─── run_round           │
//!  │  on_disconnect ──► sweep      expiry_task          │
//!  └────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hub_coordinator::{HubCoordinator, CoordinatorConfig, InMemoryRepository, NoopGeolocator};
//!
//! let coordinator = Arc::new(HubCoordinator::new(
//!     CoordinatorConfig::default(),
//!     Arc::new(InMemoryRepository::new()),
//!     Arc::new(NoopGeolocator),
//! )?);
//! tokio::spawn(scheduler_task(Arc::clone(&coordinator)));
//! ```
//!
//! # Features
//!
//! - `ws` - axum WebSocket connection handler
//! - `geolocation` - HTTP IP geolocation lookup
//! - `test-utils` - recording senders and fault-injecting repositories

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(feature = "ws")]
pub mod ws;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{ChannelPeerSender, InMemoryRepository, NoopGeolocator};
#[cfg(feature = "geolocation")]
pub use adapters::IpApiGeolocator;
pub use domain::{
    CallbackError, CallbackTable, ConfigError, ConnectionEntry, ConnectionId, CoordinatorConfig,
    HubError, PendingCheck, SendError, StorageError, ValidatorRegistry,
};
pub use ports::{
    Geolocator, MonitoringRepository, NewValidator, ObservationRecord, PeerSender, TargetCatalog,
};
pub use service::{
    expiry_task, scheduler_task, DisconnectSummary, HubCoordinator, PeerHandle, ReportOutcome,
    RoundSummary, RouteOutcome, SignupOutcome,
};
#[cfg(feature = "ws")]
pub use ws::{WebSocketConfig, WebSocketHandler};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
