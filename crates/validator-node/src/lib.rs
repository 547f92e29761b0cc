//! # Watchtower Validator
//!
//! Independent uptime validator. A validator holds an Ed25519 identity,
//! connects to the hub over WebSocket, proves that identity at signup and
//! then answers every check request with a signed probe result.
//!
//! ```text
//! hub ──validate──► Session ──spawn──► Prober (HTTP GET)
//!  ▲                                       │
//!  └──────────── signed validate ◄─────────┘
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod keys;
pub mod probe;

pub use client::{signed_report, signup_request, Session, SessionEvent, ValidatorClient};
pub use config::{Cli, Command, ValidatorConfig};
pub use keys::{load_or_generate, KeyError, KeySource};
pub use probe::{HttpProber, ProbeResult, Prober, FAILED_PROBE_LATENCY_MS};
