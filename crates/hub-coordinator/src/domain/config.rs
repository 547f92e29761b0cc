//! Coordinator configuration with validation.

use crate::domain::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between validation rounds.
pub const DEFAULT_ROUND_INTERVAL: Duration = Duration::from_secs(60);

/// Default payout credited per verified observation.
pub const DEFAULT_REWARD_PER_CHECK: u64 = 100;

/// Location recorded when geolocation is unavailable.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Scheduling and bookkeeping knobs for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Time between validation rounds
    #[serde(with = "humantime_serde")]
    pub round_interval: Duration,
    /// Payout units credited per verified observation
    pub reward_per_check: u64,
    /// How long a dispatched check waits for its reply
    #[serde(with = "humantime_serde")]
    pub callback_ttl: Duration,
    /// How often expired callbacks are purged
    #[serde(with = "humantime_serde")]
    pub expiry_sweep_interval: Duration,
    /// Fire the first round immediately instead of after one interval
    pub run_on_start: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            round_interval: DEFAULT_ROUND_INTERVAL,
            reward_per_check: DEFAULT_REWARD_PER_CHECK,
            callback_ttl: Duration::from_secs(300),
            expiry_sweep_interval: Duration::from_secs(10),
            run_on_start: false,
        }
    }
}

impl CoordinatorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "round_interval",
            });
        }

        if self.callback_ttl.is_zero() {
            return Err(ConfigError::Zero {
                field: "callback_ttl",
            });
        }

        if self.expiry_sweep_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "expiry_sweep_interval",
            });
        }

        // A reply to the previous round must be able to land
        if self.callback_ttl < self.round_interval {
            return Err(ConfigError::Invalid {
                field: "callback_ttl",
                reason: format!(
                    "{:?} is shorter than round_interval {:?}",
                    self.callback_ttl, self.round_interval
                ),
            });
        }

        Ok(())
    }
}
