//! Hub connection.
//!
//! One [`Session`] per socket: it signs up, remembers the validator id from
//! the matching acknowledgement, and answers every `validate` request with a
//! signed probe result. [`ValidatorClient`] reconnects with exponential
//! backoff whenever the socket drops.

use crate::config::ValidatorConfig;
use crate::probe::{ProbeResult, Prober};
use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use shared_crypto::Ed25519KeyPair;
use shared_types::{
    decode, encode, result_challenge, signup_challenge, CallbackId, HubMessage, SignatureBytes,
    SignupRequest, ValidateReport, ValidateRequest, ValidatorId, ValidatorMessage,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Frames queued for the socket writer
const OUTBOUND_BUFFER: usize = 256;

/// Build a signed signup request.
pub fn signup_request(keypair: &Ed25519KeyPair, callback_id: CallbackId, ip: &str) -> SignupRequest {
    let public_key = keypair.public_key().to_base58();
    let challenge = signup_challenge(&callback_id, &public_key);
    SignupRequest {
        ip: ip.to_string(),
        signed_message: SignatureBytes::new(keypair.sign(challenge.as_bytes()).to_vec()),
        public_key,
        callback_id,
    }
}

/// Build the signed reply to a check request.
pub fn signed_report(
    keypair: &Ed25519KeyPair,
    request: &ValidateRequest,
    validator_id: Option<ValidatorId>,
    result: ProbeResult,
) -> ValidateReport {
    let challenge = result_challenge(&request.callback_id);
    ValidateReport {
        callback_id: request.callback_id.clone(),
        validator_id,
        website_id: Some(request.website_id),
        status: result.status,
        latency_ms: result.latency_ms,
        signed_message: SignatureBytes::new(keypair.sign(challenge.as_bytes()).to_vec()),
    }
}

/// What a hub frame did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Admitted(ValidatorId),
    CheckStarted(CallbackId),
    HubError(String),
    Ignored,
}

/// State of one hub connection.
pub struct Session {
    keypair: Arc<Ed25519KeyPair>,
    prober: Arc<dyn Prober>,
    outbound: mpsc::Sender<ValidatorMessage>,
    signup_callback: CallbackId,
    validator_id: Option<ValidatorId>,
}

impl Session {
    pub fn new(
        keypair: Arc<Ed25519KeyPair>,
        prober: Arc<dyn Prober>,
        outbound: mpsc::Sender<ValidatorMessage>,
    ) -> Self {
        Self {
            keypair,
            prober,
            outbound,
            signup_callback: CallbackId::generate(),
            validator_id: None,
        }
    }

    /// The signup frame for this session.
    pub fn signup_message(&self, ip: &str) -> ValidatorMessage {
        ValidatorMessage::Signup(signup_request(&self.keypair, self.signup_callback.clone(), ip))
    }

    pub fn validator_id(&self) -> Option<ValidatorId> {
        self.validator_id
    }

    /// React to one decoded hub frame.
    pub fn handle(&mut self, message: HubMessage) -> SessionEvent {
        match message {
            HubMessage::Signup(ack) if ack.callback_id == self.signup_callback => {
                info!(validator_id = %ack.validator_id, "Signed up with hub");
                self.validator_id = Some(ack.validator_id);
                SessionEvent::Admitted(ack.validator_id)
            }
            HubMessage::Signup(ack) => {
                debug!(callback_id = %ack.callback_id, "Ignoring unmatched signup ack");
                SessionEvent::Ignored
            }
            HubMessage::Validate(request) => {
                let callback_id = request.callback_id.clone();
                debug!(url = %request.url, callback_id = %callback_id, "Validating");
                tokio::spawn(run_check(
                    Arc::clone(&self.keypair),
                    Arc::clone(&self.prober),
                    self.outbound.clone(),
                    request,
                    self.validator_id,
                ));
                SessionEvent::CheckStarted(callback_id)
            }
            HubMessage::Error(notice) => {
                warn!(message = %notice.message, "Hub reported an error");
                SessionEvent::HubError(notice.message)
            }
        }
    }
}

async fn run_check(
    keypair: Arc<Ed25519KeyPair>,
    prober: Arc<dyn Prober>,
    outbound: mpsc::Sender<ValidatorMessage>,
    request: ValidateRequest,
    validator_id: Option<ValidatorId>,
) {
    let result = prober.probe(&request.url).await;
    info!(
        url = %request.url,
        status = %result.status,
        latency_ms = result.latency_ms,
        "Probe complete"
    );
    let report = signed_report(&keypair, &request, validator_id, result);
    if outbound.send(ValidatorMessage::Validate(report)).await.is_err() {
        debug!(callback_id = %request.callback_id, "Connection gone before result could be sent");
    }
}

/// Long-running validator connected to one hub.
pub struct ValidatorClient {
    config: ValidatorConfig,
    keypair: Arc<Ed25519KeyPair>,
    prober: Arc<dyn Prober>,
}

impl ValidatorClient {
    pub fn new(config: ValidatorConfig, keypair: Ed25519KeyPair, prober: Arc<dyn Prober>) -> Self {
        Self {
            config,
            keypair: Arc::new(keypair),
            prober,
        }
    }

    /// Connection loop with reconnection logic. Returns on shutdown or
    /// when the retry limit is exhausted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut attempts = 0u32;

        loop {
            let outcome = tokio::select! {
                outcome = self.run_connection() => outcome,
                _ = shutdown.changed() => {
                    info!("Shutdown signal received");
                    return Ok(());
                }
            };

            match outcome {
                Ok(true) => {
                    attempts = 0;
                    info!("Hub closed the connection");
                }
                Ok(false) => info!("Connection closed before signup completed"),
                Err(e) => warn!(error = %e, "Hub connection failed"),
            }

            attempts += 1;
            if !self.config.should_retry(attempts) {
                bail!("Hub reconnection failed after {} attempts", attempts);
            }

            let delay = self.config.backoff_delay(attempts);
            info!(attempt = attempts, delay = ?delay, "Reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    /// Run a single connection. Returns whether signup was acknowledged.
    async fn run_connection(&self) -> Result<bool> {
        let (ws_stream, _) = connect_async(self.config.hub_url.as_str())
            .await
            .context("Failed to connect to hub")?;
        info!(hub_url = %self.config.hub_url, "Connected to hub");

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ValidatorMessage>(OUTBOUND_BUFFER);

        let mut session = Session::new(Arc::clone(&self.keypair), Arc::clone(&self.prober), tx);
        let signup = encode(&session.signup_message(&self.config.advertised_ip))?;
        write
            .send(Message::Text(signup.into()))
            .await
            .context("Failed to send signup")?;

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let text = match encode(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode frame");
                        continue;
                    }
                };
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        let mut failure = None;
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match decode::<HubMessage>(text.as_str()) {
                    Ok(message) => {
                        session.handle(message);
                    }
                    Err(e) => warn!(error = %e, "Ignoring undecodable hub frame"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        writer.abort();

        match failure {
            Some(e) => Err(e).context("Hub socket error"),
            None => Ok(session.validator_id().is_some()),
        }
    }
}
