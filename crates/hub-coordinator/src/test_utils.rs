//! Test utilities for the coordinator.
//!
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use hub_coordinator::test_utils::RecordingSender;
//! use hub_coordinator::PeerSender;
//! use shared_types::HubMessage;
//!
//! let sender = RecordingSender::new();
//! sender.send(HubMessage::error("hi")).unwrap();
//! assert_eq!(sender.messages().len(), 1);
//! ```

use crate::adapters::InMemoryRepository;
use crate::domain::{SendError, StorageError};
use crate::ports::{Geolocator, MonitoringRepository, NewValidator, ObservationRecord, PeerSender};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{HubMessage, MonitoredTarget, Observation, Validator, ValidatorId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A `PeerSender` that records every frame it is given.
#[derive(Debug, Default)]
pub struct RecordingSender {
    messages: Mutex<Vec<HubMessage>>,
    closed: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the socket going away. Later sends fail with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Frames sent so far.
    pub fn messages(&self) -> Vec<HubMessage> {
        self.messages.lock().clone()
    }

    /// Drain recorded frames.
    pub fn take_messages(&self) -> Vec<HubMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn last(&self) -> Option<HubMessage> {
        self.messages.lock().last().cloned()
    }
}

impl PeerSender for RecordingSender {
    fn send(&self, message: HubMessage) -> Result<(), SendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        self.messages.lock().push(message);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A sender that reports itself open but rejects every send.
///
/// Models a socket that closes between the registry snapshot and the send.
#[derive(Debug, Default)]
pub struct FailingSender;

impl PeerSender for FailingSender {
    fn send(&self, _message: HubMessage) -> Result<(), SendError> {
        Err(SendError::Closed)
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// A geolocator that always answers with the same location.
#[derive(Debug, Clone)]
pub struct FixedGeolocator(pub String);

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn locate(&self, _ip: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Wraps an `InMemoryRepository` and fails selected operations on demand.
#[derive(Default)]
pub struct FaultyRepository {
    inner: Arc<InMemoryRepository>,
    fail_listing: AtomicBool,
    fail_lookups: AtomicBool,
    fail_commits: AtomicBool,
}

impl FaultyRepository {
    pub fn new(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryRepository> {
        &self.inner
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Fail validator lookups and creation.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Backend(format!("injected {} failure", operation)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MonitoringRepository for FaultyRepository {
    async fn list_active_targets(&self) -> Result<Vec<MonitoredTarget>, StorageError> {
        Self::check(&self.fail_listing, "listing")?;
        self.inner.list_active_targets().await
    }

    async fn find_validator_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Validator>, StorageError> {
        Self::check(&self.fail_lookups, "lookup")?;
        self.inner.find_validator_by_public_key(public_key).await
    }

    async fn create_validator(&self, validator: NewValidator) -> Result<Validator, StorageError> {
        Self::check(&self.fail_lookups, "create")?;
        self.inner.create_validator(validator).await
    }

    async fn record_observation_and_credit_payout(
        &self,
        record: ObservationRecord,
        reward: u64,
    ) -> Result<Observation, StorageError> {
        Self::check(&self.fail_commits, "commit")?;
        self.inner
            .record_observation_and_credit_payout(record, reward)
            .await
    }

    async fn get_validator(&self, id: ValidatorId) -> Result<Option<Validator>, StorageError> {
        self.inner.get_validator(id).await
    }
}
