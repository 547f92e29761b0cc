//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces the coordinator **requires** the host
//! application to implement: durable storage, the per-connection outbound
//! channel, and best-effort IP geolocation.
//!
//! # Thread Safety
//!
//! All ports are `Send + Sync`; the coordinator calls them from many
//! connection tasks at once.

use crate::domain::{SendError, StorageError};
use async_trait::async_trait;
use shared_types::{
    CheckStatus, HubMessage, MonitoredTarget, Observation, TargetId, Validator, ValidatorId,
};

/// Fields needed to create a validator record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewValidator {
    pub public_key: String,
    pub ip_address: String,
    pub location: String,
}

/// A verified check result ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRecord {
    pub target_id: TargetId,
    pub validator_id: ValidatorId,
    pub status: CheckStatus,
    pub latency_ms: u64,
}

/// Storage collaborator used by the coordination core.
#[async_trait]
pub trait MonitoringRepository: Send + Sync {
    /// All targets that are not disabled.
    async fn list_active_targets(&self) -> Result<Vec<MonitoredTarget>, StorageError>;

    /// Look up a validator by its base58 public key.
    async fn find_validator_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Validator>, StorageError>;

    /// Create a validator with a zero payout balance.
    ///
    /// If a record for the same public key already exists (a concurrent
    /// signup got there first) the existing record is returned unchanged.
    async fn create_validator(&self, validator: NewValidator) -> Result<Validator, StorageError>;

    /// Append the observation and credit `reward` to the validator's pending
    /// payout as one atomic unit. On error neither change is visible.
    async fn record_observation_and_credit_payout(
        &self,
        record: ObservationRecord,
        reward: u64,
    ) -> Result<Observation, StorageError>;

    /// Fetch a validator by id.
    async fn get_validator(&self, id: ValidatorId) -> Result<Option<Validator>, StorageError>;
}

/// Target management used by the REST surface, outside the core.
#[async_trait]
pub trait TargetCatalog: Send + Sync {
    async fn create_target(&self, url: &str, owner_id: &str)
        -> Result<MonitoredTarget, StorageError>;

    async fn get_target(&self, id: TargetId) -> Result<Option<MonitoredTarget>, StorageError>;

    /// Enabled targets owned by `owner_id`.
    async fn list_targets_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<MonitoredTarget>, StorageError>;

    /// Soft-delete a target. Returns `NotFound` if `owner_id` does not own it.
    async fn disable_target(&self, id: TargetId, owner_id: &str) -> Result<(), StorageError>;

    /// Newest-first observations for one target.
    async fn recent_observations(
        &self,
        target_id: TargetId,
        limit: usize,
    ) -> Result<Vec<Observation>, StorageError>;

    async fn list_validators(&self) -> Result<Vec<Validator>, StorageError>;
}

/// Outbound half of one validator connection.
///
/// `send` must never block: the round scheduler calls it for every
/// connection in turn.
pub trait PeerSender: Send + Sync {
    fn send(&self, message: HubMessage) -> Result<(), SendError>;

    fn is_closed(&self) -> bool;
}

/// Best-effort IP to location lookup.
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Returns `None` when the location cannot be determined.
    async fn locate(&self, ip: &str) -> Option<String>;
}
