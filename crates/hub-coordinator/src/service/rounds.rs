//! Validation Round fan-out.

use crate::domain::{PendingCheck, StorageError};
use crate::service::HubCoordinator;
use shared_types::{CallbackId, HubMessage, ValidateRequest};
use tracing::{debug, info, warn};
use watchtower_telemetry::metrics::{
    CALLBACKS_EVICTED, CALLBACKS_PENDING, CHECKS_DISPATCHED, DISPATCH_FAILURES, ROUND_DURATION,
};
use watchtower_telemetry::time_histogram;

/// Counters for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Active targets listed from storage
    pub targets: usize,
    /// Admitted connections in the registry snapshot
    pub validators: usize,
    /// Check requests queued on a connection
    pub dispatched: usize,
    /// Sends that failed; their callbacks were cancelled
    pub failed: usize,
    /// Pairs skipped because the connection was already closed
    pub skipped: usize,
}

impl HubCoordinator {
    /// Run one validation round.
    ///
    /// Every (active target, admitted connection) pair gets a fresh callback
    /// id and a `validate` frame. A failed target listing aborts the round
    /// before anything is dispatched.
    pub async fn run_round(&self) -> Result<RoundSummary, StorageError> {
        let _timer = time_histogram!(ROUND_DURATION);

        let targets = self.repository.list_active_targets().await?;
        let validators = self.registry.snapshot();

        let mut summary = RoundSummary {
            targets: targets.len(),
            validators: validators.len(),
            ..Default::default()
        };

        for target in targets.iter().filter(|t| !t.disabled) {
            for validator in &validators {
                if validator.sender.is_closed() {
                    summary.skipped += 1;
                    continue;
                }

                let callback_id = CallbackId::generate();
                let check = PendingCheck::new(target, validator, self.config.callback_ttl);
                if let Err(e) = self.callbacks.register(callback_id.clone(), check) {
                    DISPATCH_FAILURES.with_label_values(&["collision"]).inc();
                    warn!(error = %e, "Skipping check with colliding callback id");
                    summary.failed += 1;
                    continue;
                }

                let request = HubMessage::Validate(ValidateRequest {
                    url: target.url.clone(),
                    callback_id: callback_id.clone(),
                    website_id: target.id,
                });

                match validator.sender.send(request) {
                    Ok(()) => {
                        CHECKS_DISPATCHED.inc();
                        summary.dispatched += 1;
                    }
                    Err(e) => {
                        self.callbacks.cancel(&callback_id);
                        CALLBACKS_EVICTED.with_label_values(&["cancelled"]).inc();
                        DISPATCH_FAILURES.with_label_values(&[e.as_str()]).inc();
                        debug!(
                            connection_id = %validator.connection_id,
                            target_id = %target.id,
                            error = %e,
                            "Check request not delivered"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }

        CALLBACKS_PENDING.set(self.callbacks.pending_count() as f64);
        info!(
            targets = summary.targets,
            validators = summary.validators,
            dispatched = summary.dispatched,
            failed = summary.failed,
            skipped = summary.skipped,
            "Validation round complete"
        );

        Ok(summary)
    }
}
