//! # Error Types

use thiserror::Error;

/// Errors raised while decoding or encoding wire frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    /// The frame has no string `type` field.
    #[error("Missing message type")]
    MissingType,

    /// The `type` field names a message this side does not accept.
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// The `type` is known but `data` does not match its shape.
    #[error("Invalid {message_type} payload: {reason}")]
    InvalidPayload {
        message_type: String,
        reason: String,
    },

    /// Serialization of an outbound frame failed.
    #[error("Encode failed: {0}")]
    Encode(String),
}
