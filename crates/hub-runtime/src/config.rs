//! # Hub Configuration
//!
//! One TOML document, every field optional. Command-line flags and
//! `WT_*` environment variables override the file.
//!
//! ```toml
//! [server]
//! port = 8081
//!
//! [server.websocket]
//! idle_timeout = "5m"
//!
//! [coordinator]
//! round_interval = "60s"
//! reward_per_check = 100
//!
//! [storage]
//! backend = "rocksdb"
//! path = "./data/watchtower"
//! ```

use clap::{Parser, ValueEnum};
use hub_coordinator::{CoordinatorConfig, WebSocketConfig};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8081;

/// Default geolocation endpoint.
pub const DEFAULT_GEOLOCATION_ENDPOINT: &str = "http://ip-api.com/json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid coordinator settings: {0}")]
    Coordinator(#[from] hub_coordinator::ConfigError),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Complete hub configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub coordinator: CoordinatorConfig,
    pub storage: StorageConfig,
    pub geolocation: GeolocationConfig,
    pub api: ApiConfig,
}

impl HubConfig {
    /// Read a TOML file. Missing sections keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                field: "server.port",
                reason: "cannot be 0".into(),
            });
        }

        let ws = &self.server.websocket;
        if ws.max_message_size == 0 {
            return Err(ConfigError::Invalid {
                field: "server.websocket.max_message_size",
                reason: "cannot be 0".into(),
            });
        }
        if ws.rate_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "server.websocket.rate_limit",
                reason: "cannot be 0".into(),
            });
        }
        if ws.outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "server.websocket.outbound_buffer",
                reason: "cannot be 0".into(),
            });
        }
        if ws.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "server.websocket.idle_timeout",
                reason: "cannot be 0".into(),
            });
        }
        if ws.ping_interval.is_zero() || ws.ping_interval >= ws.idle_timeout {
            return Err(ConfigError::Invalid {
                field: "server.websocket.ping_interval",
                reason: "must be non-zero and shorter than idle_timeout".into(),
            });
        }

        self.coordinator.validate()?;

        if self.storage.backend == StorageBackend::Rocksdb && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::Invalid {
                field: "storage.backend",
                reason: "built without the `rocksdb` feature".into(),
            });
        }

        if self.geolocation.enabled && self.geolocation.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "geolocation.timeout",
                reason: "cannot be 0".into(),
            });
        }

        if self.api.default_owner.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api.default_owner",
                reason: "cannot be empty".into(),
            });
        }

        Ok(())
    }

    /// Socket address the server binds to
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

/// HTTP / WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8081)
    pub port: u16,
    /// Per-connection limits
    pub websocket: WebSocketConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            websocket: WebSocketConfig::default(),
        }
    }
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database directory (rocksdb only)
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("./data/watchtower"),
        }
    }
}

/// IP geolocation for new validators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub enabled: bool,
    pub endpoint: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_GEOLOCATION_ENDPOINT.to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

/// Target management API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Owner used when a request carries no `x-user-id` header
    pub default_owner: String,
    /// Observations returned per target
    pub recent_ticks: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_owner: "1".to_string(),
            recent_ticks: 10,
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(s)
}

/// Watchtower hub: coordinates validators that monitor website uptime
#[derive(Parser, Debug, Default)]
#[command(name = "watchtower-hub")]
#[command(author, version, about, long_about = None)]
pub struct HubArgs {
    /// TOML configuration file
    #[arg(short, long, env = "WT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bind address
    #[arg(long, env = "WT_HOST")]
    pub host: Option<IpAddr>,

    /// Listening port
    #[arg(short, long, env = "WT_PORT")]
    pub port: Option<u16>,

    /// Time between validation rounds (e.g. "60s")
    #[arg(long, env = "WT_ROUND_INTERVAL", value_parser = parse_duration)]
    pub round_interval: Option<Duration>,

    /// Run the first round immediately instead of after one interval
    #[arg(long, env = "WT_RUN_ON_START")]
    pub run_on_start: bool,

    /// Storage backend
    #[arg(long, env = "WT_STORAGE", value_enum)]
    pub storage: Option<StorageBackend>,

    /// Database directory
    #[arg(long, env = "WT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Skip IP geolocation of new validators
    #[arg(long, env = "WT_NO_GEOLOCATION")]
    pub no_geolocation: bool,
}

impl HubArgs {
    /// Load the file (if any), apply overrides, validate.
    pub fn into_config(self) -> Result<HubConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => HubConfig::from_file(path)?,
            None => HubConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut HubConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(interval) = self.round_interval {
            config.coordinator.round_interval = interval;
        }
        if self.run_on_start {
            config.coordinator.run_on_start = true;
        }
        if let Some(backend) = self.storage {
            config.storage.backend = backend;
        }
        if let Some(path) = &self.data_dir {
            config.storage.path = path.clone();
        }
        if self.no_geolocation {
            config.geolocation.enabled = false;
        }
    }
}
