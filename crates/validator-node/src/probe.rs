//! Website probing.
//!
//! A probe is one HTTP GET. Only `200` is healthy; any other status is
//! `Bad` with the measured latency, and a request that fails outright is
//! `Bad` with a fixed latency of [`FAILED_PROBE_LATENCY_MS`].

use async_trait::async_trait;
use shared_types::CheckStatus;
use std::time::{Duration, Instant};
use tracing::debug;
use watchtower_telemetry::metrics::{PROBES, PROBE_DURATION};

/// Latency reported when the request could not complete
pub const FAILED_PROBE_LATENCY_MS: u64 = 1000;

/// Outcome of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: CheckStatus,
    pub latency_ms: u64,
}

impl ProbeResult {
    pub fn failed() -> Self {
        Self {
            status: CheckStatus::Bad,
            latency_ms: FAILED_PROBE_LATENCY_MS,
        }
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

/// `Prober` backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("watchtower-validator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeResult {
        let started = Instant::now();
        let result = match self.client.get(url).send().await {
            Ok(response) => ProbeResult {
                status: CheckStatus::from_http_status(response.status().as_u16()),
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => {
                debug!(url = url, error = %e, "Probe request failed");
                ProbeResult::failed()
            }
        };

        PROBE_DURATION.observe(started.elapsed().as_secs_f64());
        PROBES.with_label_values(&[result.status.as_str()]).inc();
        result
    }
}
