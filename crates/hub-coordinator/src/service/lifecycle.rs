use crate::domain::ConnectionId;
use crate::service::HubCoordinator;
use shared_types::ValidatorId;
use tracing::info;
use watchtower_telemetry::metrics::{CALLBACKS_EVICTED, CALLBACKS_PENDING, VALIDATORS_CONNECTED};

/// What a socket close cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisconnectSummary {
    /// Validator whose registry entry was removed, if it was still admitted
    pub validator_id: Option<ValidatorId>,
    /// Pending checks swept from the callback table
    pub swept: usize,
}

impl HubCoordinator {
    /// Release everything tied to a closed socket. Idempotent.
    pub fn on_disconnect(&self, connection_id: ConnectionId) -> DisconnectSummary {
        let removed = self.registry.remove(&connection_id);
        let swept = self.callbacks.sweep_connection(connection_id);

        if swept > 0 {
            CALLBACKS_EVICTED
                .with_label_values(&["disconnected"])
                .inc_by(swept as f64);
        }
        VALIDATORS_CONNECTED.set(self.registry.len() as f64);
        CALLBACKS_PENDING.set(self.callbacks.pending_count() as f64);

        let summary = DisconnectSummary {
            validator_id: removed.map(|entry| entry.validator_id),
            swept,
        };

        info!(
            connection_id = %connection_id,
            validator_id = ?summary.validator_id,
            swept = swept,
            "Connection released"
        );
        summary
    }
}
