//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Targets**: `MonitoredTarget`, `TargetId`
//! - **Validators**: `Validator`, `ValidatorId`
//! - **Observations**: `Observation`, `CheckStatus`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a monitored website.
    TargetId
);

uuid_id!(
    /// Durable identifier of a validator, stable across reconnects.
    ValidatorId
);

uuid_id!(
    /// Identifier of a single recorded observation.
    ObservationId
);

/// A website registered for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredTarget {
    pub id: TargetId,
    pub url: String,
    /// Account that registered the target.
    pub owner_id: String,
    /// Soft-delete flag. Disabled targets are never scheduled.
    pub disabled: bool,
}

impl MonitoredTarget {
    /// Create an enabled target with a fresh id.
    pub fn new(url: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: TargetId::new(),
            url: url.into(),
            owner_id: owner_id.into(),
            disabled: false,
        }
    }
}

/// Durable validator record.
///
/// `public_key` is the base58 Ed25519 key and is unique across records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validator {
    pub id: ValidatorId,
    pub public_key: String,
    pub location: String,
    pub ip_address: String,
    /// Accrued, unsettled reward. Only ever incremented by the hub.
    pub pending_payout: u64,
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckStatus {
    Good,
    Bad,
}

impl CheckStatus {
    /// Classify an HTTP status code. Only `200` counts as healthy.
    pub fn from_http_status(code: u16) -> Self {
        if code == 200 {
            Self::Good
        } else {
            Self::Bad
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "Good"),
            Self::Bad => write!(f, "Bad"),
        }
    }
}

/// One verified check result. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: ObservationId,
    pub target_id: TargetId,
    pub validator_id: ValidatorId,
    pub status: CheckStatus,
    pub latency_ms: u64,
    pub observed_at: DateTime<Utc>,
}
