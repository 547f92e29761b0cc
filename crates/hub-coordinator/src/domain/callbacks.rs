//! # Callback Table
//!
//! Maps a round-trip callback id to the check it was dispatched for.
//!
//! Flow:
//! 1. Scheduler mints a `CallbackId` and calls `register()` with a `PendingCheck`
//! 2. Scheduler sends the `validate` frame over the validator's connection
//! 3. The reply arrives on that connection; the router calls `take()`
//! 4. The Result Handler acts on the returned `PendingCheck`
//!
//! Entries leave the table exactly once: taken by the owning connection,
//! cancelled after a failed send, swept when the connection closes, or
//! purged by `remove_expired()` once their TTL has passed.

use crate::domain::{CallbackError, ConnectionEntry, ConnectionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::{CallbackId, MonitoredTarget, TargetId, ValidatorId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Everything the Result Handler needs, captured at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCheck {
    pub target_id: TargetId,
    pub target_url: String,
    pub validator_id: ValidatorId,
    /// Key the reply must be signed with.
    pub public_key: String,
    /// Only this connection may consume the entry.
    pub connection_id: ConnectionId,
    pub dispatched_at: Instant,
    pub ttl: Duration,
}

impl PendingCheck {
    pub fn new(target: &MonitoredTarget, validator: &ConnectionEntry, ttl: Duration) -> Self {
        Self {
            target_id: target.id,
            target_url: target.url.clone(),
            validator_id: validator.validator_id,
            public_key: validator.public_key.clone(),
            connection_id: validator.connection_id,
            dispatched_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.dispatched_at) > self.ttl
    }
}

/// Statistics for the callback table
#[derive(Debug, Default)]
pub struct CallbackStats {
    /// Total entries registered
    pub total_registered: AtomicU64,
    /// Total entries taken by their connection
    pub total_completed: AtomicU64,
    /// Total entries purged after their TTL
    pub total_expired: AtomicU64,
    /// Total entries swept on disconnect
    pub total_swept: AtomicU64,
    /// Total entries cancelled after a failed send
    pub total_cancelled: AtomicU64,
    /// Total replies with an unknown, expired or foreign id
    pub total_unmatched: AtomicU64,
}

/// Concurrent callback table.
pub struct CallbackTable {
    pending: DashMap<CallbackId, PendingCheck>,
    stats: Arc<CallbackStats>,
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackTable {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: Arc::new(CallbackStats::default()),
        }
    }

    /// Register a pending check. An id already in flight is rejected.
    pub fn register(&self, callback_id: CallbackId, check: PendingCheck) -> Result<(), CallbackError> {
        match self.pending.entry(callback_id) {
            Entry::Occupied(occupied) => Err(CallbackError::Collision(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                debug!(
                    callback_id = %vacant.key(),
                    target_id = %check.target_id,
                    connection_id = %check.connection_id,
                    "Registered pending check"
                );
                vacant.insert(check);
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Consume the entry for `callback_id` on behalf of `caller`.
    ///
    /// A foreign caller leaves the entry in place. An expired entry is removed
    /// and reported as `Expired`.
    pub fn take(
        &self,
        callback_id: &CallbackId,
        caller: ConnectionId,
    ) -> Result<PendingCheck, CallbackError> {
        let taken = self
            .pending
            .remove_if(callback_id, |_, check| check.connection_id == caller);

        let Some((id, check)) = taken else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            return Err(match self.pending.get(callback_id) {
                Some(owner) => CallbackError::ForeignConnection {
                    callback_id: callback_id.clone(),
                    owner: owner.connection_id,
                    caller,
                },
                None => CallbackError::Unknown(callback_id.clone()),
            });
        };

        if check.is_expired(Instant::now()) {
            self.stats.total_expired.fetch_add(1, Ordering::Relaxed);
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            return Err(CallbackError::Expired(id));
        }

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            callback_id = %id,
            elapsed_ms = check.dispatched_at.elapsed().as_millis(),
            "Completed pending check"
        );
        Ok(check)
    }

    /// Drop a single entry without a reply.
    pub fn cancel(&self, callback_id: &CallbackId) -> bool {
        if self.pending.remove(callback_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drop every entry dispatched to `connection_id`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_connection(&self, connection_id: ConnectionId) -> usize {
        let mut removed = 0;
        self.pending.retain(|_, check| {
            if check.connection_id == connection_id {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.stats
                .total_swept
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(
                connection_id = %connection_id,
                removed = removed,
                "Swept pending checks for closed connection"
            );
        }
        removed
    }

    /// Remove expired entries (TTL cleanup).
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, check| {
            if check.is_expired(now) {
                warn!(
                    callback_id = %id,
                    target_id = %check.target_id,
                    validator_id = %check.validator_id,
                    ttl_ms = check.ttl.as_millis(),
                    "Removing expired pending check"
                );
                removed += 1;
                false
            } else {
                true
            }
        });

        self.stats
            .total_expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of entries currently awaiting a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of entries owned by one connection
    pub fn pending_for(&self, connection_id: ConnectionId) -> usize {
        self.pending
            .iter()
            .filter(|e| e.value().connection_id == connection_id)
            .count()
    }

    pub fn is_pending(&self, callback_id: &CallbackId) -> bool {
        self.pending.contains_key(callback_id)
    }

    /// Whether `callback_id` is pending and owned by `connection_id`.
    pub fn is_pending_for(&self, callback_id: &CallbackId, connection_id: ConnectionId) -> bool {
        self.pending
            .get(callback_id)
            .is_some_and(|check| check.connection_id == connection_id)
    }

    pub fn stats(&self) -> &CallbackStats {
        &self.stats
    }
}
