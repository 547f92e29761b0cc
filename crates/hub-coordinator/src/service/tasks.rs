//! Background timer tasks.
//!
//! Both loops run until their task is dropped or aborted; the host wraps
//! them in `tokio::select!` against its shutdown signal.

use crate::domain::CallbackTable;
use crate::service::HubCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};
use watchtower_telemetry::metrics::{CALLBACKS_EVICTED, CALLBACKS_PENDING};

/// Fire a validation round every `round_interval`.
///
/// The first round fires after one interval unless `run_on_start` is set.
/// A round that overruns the interval causes missed ticks to be skipped,
/// never bunched.
pub async fn scheduler_task(coordinator: Arc<HubCoordinator>) {
    let period = coordinator.config().round_interval;
    let start = if coordinator.config().run_on_start {
        Instant::now()
    } else {
        Instant::now() + period
    };

    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Err(e) = coordinator.run_round().await {
            error!(error = %e, "Validation round skipped: could not list targets");
        }
    }
}

/// Background task to purge expired callbacks
pub async fn expiry_task(callbacks: Arc<CallbackTable>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = callbacks.remove_expired();
        if removed > 0 {
            CALLBACKS_EVICTED
                .with_label_values(&["expired"])
                .inc_by(removed as f64);
            CALLBACKS_PENDING.set(callbacks.pending_count() as f64);
            debug!(removed = removed, "Cleaned up expired pending checks");
        }
    }
}
