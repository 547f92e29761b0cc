//! Signup Handshake.
//!
//! `Connected -> Admitted` on a valid proof and a healthy store,
//! `Connected -> Rejected` otherwise. A rejected connection stays open and
//! may try again.

use crate::domain::{ConnectionEntry, ConnectionId, StorageError, UNKNOWN_LOCATION};
use crate::ports::NewValidator;
use crate::service::{HubCoordinator, PeerHandle};
use shared_crypto::verify;
use shared_types::{signup_challenge, HubMessage, SignupAck, SignupRequest, Validator, ValidatorId};
use tracing::{info, warn};
use watchtower_telemetry::metrics::{SIGNATURE_REJECTIONS, SIGNUPS, VALIDATORS_CONNECTED};

/// Result of one signup attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    /// Acknowledged and present in the registry.
    Admitted {
        validator_id: ValidatorId,
        /// A new durable record was created.
        created: bool,
        /// Older connection for the same key that was replaced.
        displaced: Option<ConnectionId>,
    },
    /// The identity proof did not verify.
    Rejected,
    /// Storage failed; nothing was admitted.
    StorageFailed,
    /// The socket closed before the acknowledgement could be queued.
    Disconnected,
}

impl HubCoordinator {
    /// Run the signup handshake for `peer`.
    pub async fn handle_signup(&self, peer: &PeerHandle, request: SignupRequest) -> SignupOutcome {
        let challenge = signup_challenge(&request.callback_id, &request.public_key);
        if !verify(
            &challenge,
            &request.public_key,
            request.signed_message.as_bytes(),
        ) {
            SIGNATURE_REJECTIONS.with_label_values(&["signup"]).inc();
            SIGNUPS.with_label_values(&["rejected"]).inc();
            warn!(
                connection_id = %peer.connection_id,
                public_key = %request.public_key,
                "Signup signature rejected"
            );
            peer.notify(HubMessage::error("Invalid signature"));
            return SignupOutcome::Rejected;
        }

        let (validator, created) = match self.find_or_create_validator(&request).await {
            Ok(found) => found,
            Err(e) => {
                SIGNUPS.with_label_values(&["storage_failed"]).inc();
                warn!(
                    connection_id = %peer.connection_id,
                    public_key = %request.public_key,
                    error = %e,
                    "Signup failed in storage"
                );
                peer.notify(HubMessage::error("Signup failed, please retry"));
                return SignupOutcome::StorageFailed;
            }
        };

        let ack = HubMessage::Signup(SignupAck {
            validator_id: validator.id,
            callback_id: request.callback_id.clone(),
        });
        if let Err(e) = peer.sender.send(ack) {
            warn!(
                connection_id = %peer.connection_id,
                validator_id = %validator.id,
                error = %e,
                "Signup acknowledgement undeliverable"
            );
            return SignupOutcome::Disconnected;
        }

        let displaced = self.registry.admit(ConnectionEntry {
            connection_id: peer.connection_id,
            validator_id: validator.id,
            public_key: validator.public_key.clone(),
            sender: peer.sender.clone(),
        });
        let displaced = displaced.map(|old| self.retire_displaced(old));

        VALIDATORS_CONNECTED.set(self.registry.len() as f64);
        SIGNUPS
            .with_label_values(&[if created { "created" } else { "admitted" }])
            .inc();
        info!(
            connection_id = %peer.connection_id,
            validator_id = %validator.id,
            created = created,
            location = %validator.location,
            "Validator admitted"
        );

        SignupOutcome::Admitted {
            validator_id: validator.id,
            created,
            displaced,
        }
    }

    async fn find_or_create_validator(
        &self,
        request: &SignupRequest,
    ) -> Result<(Validator, bool), StorageError> {
        if let Some(existing) = self
            .repository
            .find_validator_by_public_key(&request.public_key)
            .await?
        {
            return Ok((existing, false));
        }

        let location = self
            .geolocator
            .locate(&request.ip)
            .await
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        let validator = self
            .repository
            .create_validator(NewValidator {
                public_key: request.public_key.clone(),
                ip_address: request.ip.clone(),
                location,
            })
            .await?;
        Ok((validator, true))
    }

    /// Notify and clean up a connection replaced by a newer one.
    fn retire_displaced(&self, old: ConnectionEntry) -> ConnectionId {
        SIGNUPS.with_label_values(&["displaced"]).inc();
        let swept = self.callbacks.sweep_connection(old.connection_id);
        info!(
            connection_id = %old.connection_id,
            validator_id = %old.validator_id,
            swept = swept,
            "Connection superseded by a newer signup"
        );
        if let Err(e) = old.sender.send(HubMessage::error(
            "Superseded by a newer connection for this key",
        )) {
            warn!(
                connection_id = %old.connection_id,
                error = %e,
                "Could not notify displaced connection"
            );
        }
        old.connection_id
    }
}
