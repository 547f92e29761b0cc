//! Error types for the coordinator.

use crate::domain::ConnectionId;
use shared_types::{CallbackId, ProtocolError};
use thiserror::Error;

/// Failures reported by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored bytes could not be decoded.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Backend rejected or failed the operation.
    #[error("Database error: {0}")]
    Backend(String),
}

/// Failures from a peer's outbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The socket writer has gone away.
    #[error("connection closed")]
    Closed,

    /// The outbound buffer is full.
    #[error("outbound buffer full")]
    Full,
}

impl SendError {
    /// Label used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Full => "full",
        }
    }
}

/// Callback Table failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// The id is already in flight.
    #[error("callback id already registered: {0}")]
    Collision(CallbackId),

    /// Never registered, already consumed, swept or expired.
    #[error("unknown callback id: {0}")]
    Unknown(CallbackId),

    /// The entry outlived its TTL before the reply arrived.
    #[error("callback id expired: {0}")]
    Expired(CallbackId),

    /// A different connection tried to consume the entry.
    #[error("callback {callback_id} belongs to connection {owner}, not {caller}")]
    ForeignConnection {
        callback_id: CallbackId,
        owner: ConnectionId,
        caller: ConnectionId,
    },
}

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level coordinator error.
#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Callback(#[from] CallbackError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
