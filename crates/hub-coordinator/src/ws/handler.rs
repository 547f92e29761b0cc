//! WebSocket connection handler.
//!
//! One handler per upgraded socket. The socket is split: a writer task
//! drains the connection's outbound queue, the reader loop decodes text
//! frames with [`HubCoordinator::decode_frame`] and hands them to
//! [`HubCoordinator::dispatch`].
//!
//! Limits:
//! - Message size (default 64KB)
//! - Per-connection rate limit, not applied to replies for checks pending
//!   on the same connection
//! - Idle timeout, kept alive by a periodic ping from the writer

use crate::adapters::ChannelPeerSender;
use crate::domain::ConnectionId;
use crate::service::{HubCoordinator, PeerHandle};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use shared_types::{encode, HubMessage, ValidatorMessage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use watchtower_telemetry::metrics::PROTOCOL_ERRORS;

/// Default maximum message size (64KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default rate limit (messages per second)
pub const DEFAULT_RATE_LIMIT: u32 = 50;

/// Default outbound queue depth per connection
pub const DEFAULT_OUTBOUND_BUFFER: usize = 1024;

/// Default ping interval
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Rate limit (messages per second per connection)
    pub rate_limit: u32,
    /// Ping interval
    #[serde(with = "humantime_serde")]
    pub ping_interval: Duration,
    /// Idle timeout (disconnect if nothing is received)
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// Frames queued for the writer before sends fail with `Full`.
    ///
    /// A round queues one `validate` frame per active target on every
    /// connection in one pass, so this also caps the targets a validator
    /// can be sent per round. Checks past the cap are cancelled and
    /// counted as failed in the round summary.
    pub outbound_buffer: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            rate_limit: DEFAULT_RATE_LIMIT,
            ping_interval: DEFAULT_PING_INTERVAL,
            idle_timeout: Duration::from_secs(300),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

/// WebSocket connection handler
pub struct WebSocketHandler {
    coordinator: Arc<HubCoordinator>,
    config: WebSocketConfig,
    /// Message counter for rate limiting
    message_count: u32,
    /// Rate limit window start
    rate_limit_window: Instant,
}

impl WebSocketHandler {
    pub fn new(coordinator: Arc<HubCoordinator>) -> Self {
        Self::with_config(coordinator, WebSocketConfig::default())
    }

    pub fn with_config(coordinator: Arc<HubCoordinator>, config: WebSocketConfig) -> Self {
        Self {
            coordinator,
            config,
            message_count: 0,
            rate_limit_window: Instant::now(),
        }
    }

    /// Check rate limit, returns true if the frame is allowed
    fn check_rate_limit(&mut self) -> bool {
        let now = Instant::now();

        // Reset window every second
        if now.duration_since(self.rate_limit_window) >= Duration::from_secs(1) {
            self.rate_limit_window = now;
            self.message_count = 0;
        }

        self.message_count += 1;
        self.message_count <= self.config.rate_limit
    }

    /// Check an inbound frame against the size limit.
    fn check_size(&self, size: usize) -> Option<HubMessage> {
        if size > self.config.max_message_size {
            PROTOCOL_ERRORS.with_label_values(&["oversized"]).inc();
            return Some(HubMessage::error(format!(
                "Message too large: {} bytes (max: {})",
                size, self.config.max_message_size
            )));
        }
        None
    }

    /// Apply the rate limit to a decoded frame.
    ///
    /// Replies to checks pending on this connection are always let through;
    /// their volume is set by the rounds, not by the validator.
    fn limit_frame(
        &mut self,
        connection_id: ConnectionId,
        message: &ValidatorMessage,
    ) -> Option<HubMessage> {
        if self.coordinator.answers_pending_check(connection_id, message) {
            return None;
        }
        if !self.check_rate_limit() {
            PROTOCOL_ERRORS.with_label_values(&["rate_limited"]).inc();
            return Some(HubMessage::error("Rate limit exceeded"));
        }
        None
    }

    /// Serve one upgraded socket until it closes.
    pub async fn handle(mut self, socket: WebSocket) {
        let (sender, mut outbound) = ChannelPeerSender::channel(self.config.outbound_buffer);
        let peer = PeerHandle::new(Arc::new(sender));
        let connection_id = peer.connection_id;

        info!(connection_id = %connection_id, "New WebSocket connection");

        let (mut sink, mut stream) = socket.split();

        let ping_interval = self.config.ping_interval;
        let writer = tokio::spawn(async move {
            let mut ping = tokio::time::interval_at(
                tokio::time::Instant::now() + ping_interval,
                ping_interval,
            );
            ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let frame = tokio::select! {
                    message = outbound.recv() => {
                        let Some(message) = message else { break };
                        match encode(&message) {
                            Ok(text) => Message::Text(text),
                            Err(e) => {
                                error!(connection_id = %connection_id, error = %e, "Failed to encode frame");
                                continue;
                            }
                        }
                    }
                    _ = ping.tick() => Message::Ping(Vec::new()),
                };
                if let Err(e) = sink.send(frame).await {
                    debug!(connection_id = %connection_id, error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        loop {
            let next = match tokio::time::timeout(self.config.idle_timeout, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!(connection_id = %connection_id, "Closing idle WebSocket connection");
                    break;
                }
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    if let Some(notice) = self.check_size(text.len()) {
                        warn!(
                            connection_id = %connection_id,
                            size = text.len(),
                            "Dropping oversized frame"
                        );
                        peer.notify(notice);
                        continue;
                    }
                    let message = match self.coordinator.decode_frame(&peer, &text) {
                        Ok(message) => message,
                        Err(_) => {
                            self.check_rate_limit();
                            continue;
                        }
                    };
                    if let Some(notice) = self.limit_frame(connection_id, &message) {
                        warn!(connection_id = %connection_id, "Dropping rate-limited frame");
                        peer.notify(notice);
                        continue;
                    }
                    self.coordinator.dispatch(&peer, message).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    PROTOCOL_ERRORS.with_label_values(&["binary"]).inc();
                    debug!(
                        connection_id = %connection_id,
                        size = data.len(),
                        "Binary frame rejected"
                    );
                    peer.notify(HubMessage::error("Binary frames are not supported"));
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Pongs are queued by the protocol layer
                }
                Some(Ok(Message::Close(_))) => {
                    debug!(connection_id = %connection_id, "WebSocket close received");
                    break;
                }
                Some(Err(e)) => {
                    warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                    break;
                }
                None => break,
            }
        }

        self.coordinator.on_disconnect(connection_id);
        drop(peer);
        writer.abort();

        info!(connection_id = %connection_id, "WebSocket connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryRepository, NoopGeolocator};
    use crate::domain::{ConnectionEntry, CoordinatorConfig, PendingCheck};
    use crate::test_utils::RecordingSender;
    use shared_types::{
        CallbackId, CheckStatus, MonitoredTarget, SignatureBytes, SignupRequest, ValidateReport,
        ValidatorId,
    };

    fn handler(config: WebSocketConfig) -> WebSocketHandler {
        let coordinator = HubCoordinator::new(
            CoordinatorConfig::default(),
            Arc::new(InMemoryRepository::new()),
            Arc::new(NoopGeolocator),
        )
        .unwrap();
        WebSocketHandler::with_config(Arc::new(coordinator), config)
    }

    fn signup_frame() -> ValidatorMessage {
        ValidatorMessage::Signup(SignupRequest {
            ip: "127.0.0.1".into(),
            public_key: "key".into(),
            callback_id: CallbackId::generate(),
            signed_message: SignatureBytes::new(vec![0; 64]),
        })
    }

    fn reply_frame(callback_id: CallbackId) -> ValidatorMessage {
        ValidatorMessage::Validate(ValidateReport {
            callback_id,
            validator_id: None,
            website_id: None,
            status: CheckStatus::Good,
            latency_ms: 1,
            signed_message: SignatureBytes::new(vec![0; 64]),
        })
    }

    /// Register a pending check owned by `connection_id`.
    fn pending_check(handler: &WebSocketHandler, connection_id: ConnectionId) -> CallbackId {
        let target = MonitoredTarget::new("https://example.com", "owner");
        let entry = ConnectionEntry {
            connection_id,
            validator_id: ValidatorId::new(),
            public_key: "key".into(),
            sender: Arc::new(RecordingSender::new()),
        };
        let callback_id = CallbackId::generate();
        handler
            .coordinator
            .callbacks()
            .register(
                callback_id.clone(),
                PendingCheck::new(&target, &entry, Duration::from_secs(60)),
            )
            .unwrap();
        callback_id
    }

    #[test]
    fn test_rate_limit_window() {
        let mut handler = handler(WebSocketConfig {
            rate_limit: 3,
            ..Default::default()
        });
        let conn = ConnectionId::new();

        assert!(handler.limit_frame(conn, &signup_frame()).is_none());
        assert!(handler.limit_frame(conn, &signup_frame()).is_none());
        assert!(handler.limit_frame(conn, &signup_frame()).is_none());
        assert_eq!(
            handler.limit_frame(conn, &signup_frame()),
            Some(HubMessage::error("Rate limit exceeded"))
        );

        handler.rate_limit_window = Instant::now() - Duration::from_secs(2);
        assert!(handler.limit_frame(conn, &signup_frame()).is_none());
    }

    #[test]
    fn test_pending_replies_bypass_rate_limit() {
        let mut handler = handler(WebSocketConfig {
            rate_limit: 1,
            ..Default::default()
        });
        let conn = ConnectionId::new();

        assert!(handler.limit_frame(conn, &signup_frame()).is_none());
        assert!(handler.limit_frame(conn, &signup_frame()).is_some());

        for _ in 0..100 {
            let callback_id = pending_check(&handler, conn);
            assert!(handler.limit_frame(conn, &reply_frame(callback_id)).is_none());
        }

        // Unknown ids and checks owned by another socket still count.
        assert!(handler
            .limit_frame(conn, &reply_frame(CallbackId::generate()))
            .is_some());
        let foreign = pending_check(&handler, ConnectionId::new());
        assert!(handler.limit_frame(conn, &reply_frame(foreign)).is_some());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let handler = handler(WebSocketConfig {
            max_message_size: 16,
            ..Default::default()
        });

        assert!(handler.check_size(16).is_none());
        assert!(matches!(handler.check_size(17), Some(HubMessage::Error(_))));
    }

    #[test]
    fn test_config_from_toml_like_json() {
        let config: WebSocketConfig = serde_json::from_str(
            r#"{"idle_timeout":"90s","ping_interval":"15s","rate_limit":5}"#,
        )
        .unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.outbound_buffer, DEFAULT_OUTBOUND_BUFFER);
    }
}
