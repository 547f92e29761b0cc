//! In-memory storage for development and tests.
//!
//! All state sits behind a single `parking_lot::Mutex`, so every
//! multi-record write is atomic: checks run first, mutations follow under
//! the same guard.

use crate::domain::StorageError;
use crate::ports::{MonitoringRepository, NewValidator, ObservationRecord, TargetCatalog};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use shared_types::{MonitoredTarget, Observation, ObservationId, TargetId, Validator, ValidatorId};
use std::collections::HashMap;

#[derive(Default)]
struct MemoryState {
    targets: HashMap<TargetId, MonitoredTarget>,
    validators: HashMap<ValidatorId, Validator>,
    validator_keys: HashMap<String, ValidatorId>,
    observations: Vec<Observation>,
}

/// `MonitoringRepository` and `TargetCatalog` over process memory.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a target directly.
    pub fn insert_target(&self, target: MonitoredTarget) {
        self.state.lock().targets.insert(target.id, target);
    }

    /// Every observation, oldest first.
    pub fn observations(&self) -> Vec<Observation> {
        self.state.lock().observations.clone()
    }

    pub fn observation_count(&self) -> usize {
        self.state.lock().observations.len()
    }

    pub fn validator_count(&self) -> usize {
        self.state.lock().validators.len()
    }

    /// Current payout balance, if the validator exists.
    pub fn pending_payout(&self, id: ValidatorId) -> Option<u64> {
        self.state.lock().validators.get(&id).map(|v| v.pending_payout)
    }
}

#[async_trait]
impl MonitoringRepository for InMemoryRepository {
    async fn list_active_targets(&self) -> Result<Vec<MonitoredTarget>, StorageError> {
        let state = self.state.lock();
        let mut targets: Vec<_> = state
            .targets
            .values()
            .filter(|t| !t.disabled)
            .cloned()
            .collect();
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(targets)
    }

    async fn find_validator_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Validator>, StorageError> {
        let state = self.state.lock();
        Ok(state
            .validator_keys
            .get(public_key)
            .and_then(|id| state.validators.get(id))
            .cloned())
    }

    async fn create_validator(&self, validator: NewValidator) -> Result<Validator, StorageError> {
        let mut state = self.state.lock();

        if let Some(existing) = state
            .validator_keys
            .get(&validator.public_key)
            .and_then(|id| state.validators.get(id))
        {
            return Ok(existing.clone());
        }

        let record = Validator {
            id: ValidatorId::new(),
            public_key: validator.public_key,
            location: validator.location,
            ip_address: validator.ip_address,
            pending_payout: 0,
        };
        state
            .validator_keys
            .insert(record.public_key.clone(), record.id);
        state.validators.insert(record.id, record.clone());
        Ok(record)
    }

    async fn record_observation_and_credit_payout(
        &self,
        record: ObservationRecord,
        reward: u64,
    ) -> Result<Observation, StorageError> {
        let mut state = self.state.lock();

        if !state.targets.contains_key(&record.target_id) {
            return Err(StorageError::NotFound(format!("target {}", record.target_id)));
        }

        let validator = state
            .validators
            .get_mut(&record.validator_id)
            .ok_or_else(|| StorageError::NotFound(format!("validator {}", record.validator_id)))?;

        let credited = validator.pending_payout.checked_add(reward).ok_or_else(|| {
            StorageError::Backend(format!("payout overflow for validator {}", validator.id))
        })?;
        validator.pending_payout = credited;

        let observation = Observation {
            id: ObservationId::new(),
            target_id: record.target_id,
            validator_id: record.validator_id,
            status: record.status,
            latency_ms: record.latency_ms,
            observed_at: Utc::now(),
        };
        state.observations.push(observation.clone());
        Ok(observation)
    }

    async fn get_validator(&self, id: ValidatorId) -> Result<Option<Validator>, StorageError> {
        Ok(self.state.lock().validators.get(&id).cloned())
    }
}

#[async_trait]
impl TargetCatalog for InMemoryRepository {
    async fn create_target(
        &self,
        url: &str,
        owner_id: &str,
    ) -> Result<MonitoredTarget, StorageError> {
        let target = MonitoredTarget::new(url, owner_id);
        self.insert_target(target.clone());
        Ok(target)
    }

    async fn get_target(&self, id: TargetId) -> Result<Option<MonitoredTarget>, StorageError> {
        Ok(self.state.lock().targets.get(&id).cloned())
    }

    async fn list_targets_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<MonitoredTarget>, StorageError> {
        let state = self.state.lock();
        let mut targets: Vec<_> = state
            .targets
            .values()
            .filter(|t| !t.disabled && t.owner_id == owner_id)
            .cloned()
            .collect();
        targets.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(targets)
    }

    async fn disable_target(&self, id: TargetId, owner_id: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        match state.targets.get_mut(&id) {
            Some(target) if target.owner_id == owner_id => {
                target.disabled = true;
                Ok(())
            }
            _ => Err(StorageError::NotFound(format!("target {}", id))),
        }
    }

    async fn recent_observations(
        &self,
        target_id: TargetId,
        limit: usize,
    ) -> Result<Vec<Observation>, StorageError> {
        let state = self.state.lock();
        Ok(state
            .observations
            .iter()
            .rev()
            .filter(|o| o.target_id == target_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_validators(&self) -> Result<Vec<Validator>, StorageError> {
        let state = self.state.lock();
        let mut validators: Vec<_> = state.validators.values().cloned().collect();
        validators.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        Ok(validators)
    }
}
