//! Inbound frame routing.
//!
//! Each connection's reader task hands every text frame to
//! [`HubCoordinator::route`]. Frames are decoded once into the closed
//! `ValidatorMessage` set and dispatched by type; anything that fails to
//! decode earns an `error` reply and the connection stays open.

use crate::domain::ConnectionId;
use crate::ports::PeerSender;
use crate::service::{HubCoordinator, ReportOutcome, SignupOutcome};
use shared_types::{decode, HubMessage, ProtocolError, ValidatorMessage, WireMessage};
use std::sync::Arc;
use tracing::{debug, warn};
use watchtower_telemetry::metrics::PROTOCOL_ERRORS;

/// The coordinator's view of one live socket.
#[derive(Clone)]
pub struct PeerHandle {
    pub connection_id: ConnectionId,
    pub sender: Arc<dyn PeerSender>,
}

impl PeerHandle {
    pub fn new(sender: Arc<dyn PeerSender>) -> Self {
        Self {
            connection_id: ConnectionId::new(),
            sender,
        }
    }

    /// Best-effort send; failures are logged and otherwise ignored.
    pub(crate) fn notify(&self, message: HubMessage) {
        if let Err(e) = self.sender.send(message) {
            debug!(
                connection_id = %self.connection_id,
                error = %e,
                "Dropping frame for unreachable connection"
            );
        }
    }
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Signup(SignupOutcome),
    Report(ReportOutcome),
    Rejected(ProtocolError),
}

impl HubCoordinator {
    /// Decode and dispatch one text frame from `peer`.
    pub async fn route(&self, peer: &PeerHandle, text: &str) -> RouteOutcome {
        match self.decode_frame(peer, text) {
            Ok(message) => self.dispatch(peer, message).await,
            Err(e) => RouteOutcome::Rejected(e),
        }
    }

    /// Decode one text frame. A failure is counted and answered with an
    /// `error` frame.
    pub fn decode_frame(
        &self,
        peer: &PeerHandle,
        text: &str,
    ) -> Result<ValidatorMessage, ProtocolError> {
        decode::<ValidatorMessage>(text).map_err(|e| {
            PROTOCOL_ERRORS
                .with_label_values(&[protocol_error_kind(&e)])
                .inc();
            warn!(
                connection_id = %peer.connection_id,
                error = %e,
                "Rejecting undecodable frame"
            );
            peer.notify(HubMessage::error(e.to_string()));
            e
        })
    }

    /// Dispatch an already decoded frame by type.
    pub async fn dispatch(&self, peer: &PeerHandle, message: ValidatorMessage) -> RouteOutcome {
        debug!(
            connection_id = %peer.connection_id,
            message_type = message.message_type(),
            "Routing frame"
        );

        match message {
            ValidatorMessage::Signup(request) => {
                RouteOutcome::Signup(self.handle_signup(peer, request).await)
            }
            ValidatorMessage::Validate(report) => {
                RouteOutcome::Report(self.handle_report(peer, report).await)
            }
        }
    }

    /// Whether `message` answers a check still pending on `connection_id`.
    pub fn answers_pending_check(
        &self,
        connection_id: ConnectionId,
        message: &ValidatorMessage,
    ) -> bool {
        match message {
            ValidatorMessage::Validate(report) => self
                .callbacks
                .is_pending_for(&report.callback_id, connection_id),
            ValidatorMessage::Signup(_) => false,
        }
    }
}

/// Metric label for a decode failure.
pub(crate) fn protocol_error_kind(error: &ProtocolError) -> &'static str {
    match error {
        ProtocolError::MalformedJson(_) => "malformed_json",
        ProtocolError::MissingType => "missing_type",
        ProtocolError::UnknownType(_) => "unknown_type",
        ProtocolError::InvalidPayload { .. } => "invalid_payload",
        ProtocolError::Encode(_) => "encode",
    }
}
