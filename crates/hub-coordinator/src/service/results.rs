//! Validation Result handling.

use crate::domain::CallbackError;
use crate::ports::ObservationRecord;
use crate::service::{HubCoordinator, PeerHandle};
use shared_crypto::verify;
use shared_types::{result_challenge, ObservationId, ValidateReport};
use tracing::{debug, info, warn};
use watchtower_telemetry::metrics::{
    CALLBACKS_EVICTED, CALLBACKS_PENDING, COMMIT_FAILURES, OBSERVATIONS_RECORDED,
    SIGNATURE_REJECTIONS, UNKNOWN_CALLBACKS,
};

/// Result of one `validate` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Observation appended and payout credited.
    Recorded { observation_id: ObservationId },
    /// Id never registered, already consumed, swept or expired.
    UnknownCallback,
    /// Id belongs to a check dispatched to another connection.
    ForeignConnection,
    /// Signature did not verify; the claim was discarded.
    SignatureRejected,
    /// Storage rejected the commit; nothing was written.
    StorageFailed,
}

impl HubCoordinator {
    /// Handle a signed check result from `peer`.
    ///
    /// The pending check is consumed before verification, so a reply with a
    /// bad signature cannot be retried under the same id. Failures never
    /// produce a reply frame.
    pub async fn handle_report(&self, peer: &PeerHandle, report: ValidateReport) -> ReportOutcome {
        let pending = match self.callbacks.take(&report.callback_id, peer.connection_id) {
            Ok(pending) => pending,
            Err(e) => {
                UNKNOWN_CALLBACKS.inc();
                debug!(
                    connection_id = %peer.connection_id,
                    error = %e,
                    "Ignoring unmatched reply"
                );
                return match e {
                    CallbackError::ForeignConnection { .. } => ReportOutcome::ForeignConnection,
                    CallbackError::Expired(_) => {
                        CALLBACKS_EVICTED.with_label_values(&["expired"]).inc();
                        ReportOutcome::UnknownCallback
                    }
                    _ => ReportOutcome::UnknownCallback,
                };
            }
        };
        CALLBACKS_PENDING.set(self.callbacks.pending_count() as f64);

        let challenge = result_challenge(&report.callback_id);
        if !verify(
            &challenge,
            &pending.public_key,
            report.signed_message.as_bytes(),
        ) {
            SIGNATURE_REJECTIONS.with_label_values(&["result"]).inc();
            warn!(
                connection_id = %peer.connection_id,
                validator_id = %pending.validator_id,
                callback_id = %report.callback_id,
                "Result signature rejected"
            );
            return ReportOutcome::SignatureRejected;
        }

        if report.website_id.is_some_and(|id| id != pending.target_id)
            || report.validator_id.is_some_and(|id| id != pending.validator_id)
        {
            warn!(
                callback_id = %report.callback_id,
                target_id = %pending.target_id,
                validator_id = %pending.validator_id,
                "Reply identifiers disagree with dispatch record; using dispatch record"
            );
        }

        let record = ObservationRecord {
            target_id: pending.target_id,
            validator_id: pending.validator_id,
            status: report.status,
            latency_ms: report.latency_ms,
        };

        match self
            .repository
            .record_observation_and_credit_payout(record, self.config.reward_per_check)
            .await
        {
            Ok(observation) => {
                OBSERVATIONS_RECORDED
                    .with_label_values(&[observation.status.as_str()])
                    .inc();
                info!(
                    target_id = %observation.target_id,
                    validator_id = %observation.validator_id,
                    status = %observation.status,
                    latency_ms = observation.latency_ms,
                    "Observation recorded"
                );
                ReportOutcome::Recorded {
                    observation_id: observation.id,
                }
            }
            Err(e) => {
                COMMIT_FAILURES.inc();
                warn!(
                    target_id = %pending.target_id,
                    validator_id = %pending.validator_id,
                    error = %e,
                    "Observation commit failed"
                );
                ReportOutcome::StorageFailed
            }
        }
    }
}
