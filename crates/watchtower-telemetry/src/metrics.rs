//! Prometheus metrics for the hub and validator processes.
//!
//! All metrics follow the naming convention: `wt_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., checks_dispatched_total)
//! - **Gauge**: Value that can go up or down (e.g., validators_connected)
//! - **Histogram**: Distribution of values (e.g., round_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Process-wide metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // HUB: CONNECTIONS & SIGNUP
    // =========================================================================

    /// Validators currently admitted into the registry
    pub static ref VALIDATORS_CONNECTED: Gauge = Gauge::new(
        "wt_hub_validators_connected",
        "Number of admitted validator connections"
    ).expect("metric creation failed");

    /// Signup attempts by outcome
    pub static ref SIGNUPS: CounterVec = CounterVec::new(
        Opts::new("wt_hub_signups_total", "Signup attempts by outcome"),
        &["outcome"]  // admitted, created, rejected, storage_failed, displaced
    ).expect("metric creation failed");

    /// Frames that failed to decode
    pub static ref PROTOCOL_ERRORS: CounterVec = CounterVec::new(
        Opts::new("wt_hub_protocol_errors_total", "Inbound frames rejected during decoding"),
        &["kind"]  // malformed_json, missing_type, unknown_type, invalid_payload, binary
    ).expect("metric creation failed");

    // =========================================================================
    // HUB: ROUNDS & CALLBACKS
    // =========================================================================

    /// Check requests delivered to validator connections
    pub static ref CHECKS_DISPATCHED: Counter = Counter::new(
        "wt_hub_checks_dispatched_total",
        "Check requests handed to validator connections"
    ).expect("metric creation failed");

    /// Check requests that could not be dispatched
    pub static ref DISPATCH_FAILURES: CounterVec = CounterVec::new(
        Opts::new("wt_hub_dispatch_failures_total", "Check requests that were not delivered"),
        &["reason"]  // closed, full, collision
    ).expect("metric creation failed");

    /// Round duration histogram
    pub static ref ROUND_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "wt_hub_round_duration_seconds",
            "Time spent fanning out one validation round"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Callbacks awaiting a reply
    pub static ref CALLBACKS_PENDING: Gauge = Gauge::new(
        "wt_hub_callbacks_pending",
        "Pending check callbacks awaiting a validator reply"
    ).expect("metric creation failed");

    /// Callbacks removed without a reply
    pub static ref CALLBACKS_EVICTED: CounterVec = CounterVec::new(
        Opts::new("wt_hub_callbacks_evicted_total", "Callbacks removed without a reply"),
        &["reason"]  // expired, disconnected, cancelled
    ).expect("metric creation failed");

    /// Replies whose callback id was unknown or already consumed
    pub static ref UNKNOWN_CALLBACKS: Counter = Counter::new(
        "wt_hub_unknown_callbacks_total",
        "Replies carrying an unknown, consumed or foreign callback id"
    ).expect("metric creation failed");

    // =========================================================================
    // HUB: RESULTS
    // =========================================================================

    /// Verified observations committed to storage
    pub static ref OBSERVATIONS_RECORDED: CounterVec = CounterVec::new(
        Opts::new("wt_hub_observations_recorded_total", "Observations committed by status"),
        &["status"]
    ).expect("metric creation failed");

    /// Signature checks that failed
    pub static ref SIGNATURE_REJECTIONS: CounterVec = CounterVec::new(
        Opts::new("wt_hub_signature_rejections_total", "Signature verification failures"),
        &["stage"]  // signup, result
    ).expect("metric creation failed");

    /// Atomic commits that failed
    pub static ref COMMIT_FAILURES: Counter = Counter::new(
        "wt_hub_commit_failures_total",
        "Observation and payout commits rejected by storage"
    ).expect("metric creation failed");

    // =========================================================================
    // VALIDATOR: PROBES
    // =========================================================================

    /// Probes performed by outcome
    pub static ref PROBES: CounterVec = CounterVec::new(
        Opts::new("wt_validator_probes_total", "Probes performed by status"),
        &["status"]
    ).expect("metric creation failed");

    /// Probe latency
    pub static ref PROBE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "wt_validator_probe_duration_seconds",
            "Wall time of a single HTTP probe"
        ).buckets(exponential_buckets(0.005, 2.0, 12).expect("valid buckets"))
    ).expect("metric creation failed");
}

/// Register all metrics with the process registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Connections
        Box::new(VALIDATORS_CONNECTED.clone()),
        Box::new(SIGNUPS.clone()),
        Box::new(PROTOCOL_ERRORS.clone()),
        // Rounds
        Box::new(CHECKS_DISPATCHED.clone()),
        Box::new(DISPATCH_FAILURES.clone()),
        Box::new(ROUND_DURATION.clone()),
        Box::new(CALLBACKS_PENDING.clone()),
        Box::new(CALLBACKS_EVICTED.clone()),
        Box::new(UNKNOWN_CALLBACKS.clone()),
        // Results
        Box::new(OBSERVATIONS_RECORDED.clone()),
        Box::new(SIGNATURE_REJECTIONS.clone()),
        Box::new(COMMIT_FAILURES.clone()),
        // Validator
        Box::new(PROBES.clone()),
        Box::new(PROBE_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
