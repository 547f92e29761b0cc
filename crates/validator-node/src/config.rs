//! Validator command line.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Base delay between reconnection attempts (exponential backoff).
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Maximum delay between reconnection attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

fn parse_duration(s: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(s)
}

/// Watchtower validator: probes websites on behalf of the uptime hub
#[derive(Parser, Debug)]
#[command(name = "watchtower-validator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: ValidatorConfig,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a keypair and print the PRIVATE_KEY line
    Keygen {
        /// Also write the line to this file (replaces its contents)
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
}

/// Connection and probing settings
#[derive(Args, Debug, Clone)]
pub struct ValidatorConfig {
    /// Hub WebSocket URL
    #[arg(long, env = "WT_HUB_URL", default_value = "ws://localhost:8081")]
    pub hub_url: String,

    /// IP address reported at signup
    #[arg(long, env = "WT_ADVERTISED_IP", default_value = "127.0.0.1")]
    pub advertised_ip: String,

    /// Timeout for one website probe
    #[arg(long, env = "WT_PROBE_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub probe_timeout: Duration,

    /// Give up after this many consecutive failed connections (0 = never)
    #[arg(long, env = "WT_MAX_RECONNECT_ATTEMPTS", default_value_t = 0)]
    pub max_reconnect_attempts: u32,

    /// Secret key as a JSON array of 64 bytes
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,
}

impl ValidatorConfig {
    /// Calculate exponential backoff delay.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        std::cmp::min(
            RECONNECT_BASE_DELAY.saturating_mul(1 << attempts.min(6)),
            MAX_RECONNECT_DELAY,
        )
    }

    /// Check if we should retry connection.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_reconnect_attempts == 0 || attempts < self.max_reconnect_attempts
    }
}
