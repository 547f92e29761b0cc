//! # Hub/Validator Wire Protocol
//!
//! Every frame is a JSON text message shaped `{"type": ..., "data": {...}}`.
//!
//! | Direction | type | data |
//! |-----------|------|------|
//! | validator → hub | `signup` | `ip, publicKey, callbackId, signedMessage` |
//! | hub → validator | `signup` | `validatorId, callbackId` |
//! | hub → validator | `validate` | `url, callbackId, websiteId` |
//! | validator → hub | `validate` | `callbackId, validatorId, websiteId, status, latencyMs, signedMessage` |
//! | hub → validator | `error` | `message` |
//!
//! `signedMessage` travels as a string holding a JSON array of byte values,
//! e.g. `"[12,250,7,...]"`.

use crate::entities::{CheckStatus, TargetId, ValidatorId};
use crate::errors::ProtocolError;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// CORRELATION
// =============================================================================

/// Round-trip correlation identifier.
///
/// Validators pick their own signup ids, so this is free text on the wire.
/// Ids minted by the hub are random UUIDv4 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackId(String);

impl CallbackId {
    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CallbackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CallbackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// SIGNATURE ENCODING
// =============================================================================

/// Detached signature bytes in their wire form.
///
/// Serializes as a string containing a JSON array (`"[1,2,3]"`). Decoding
/// also accepts a bare array. Any other shape decodes to an empty signature,
/// which can never verify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureBytes(Vec<u8>);

impl SignatureBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SignatureBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(&self.0).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Array(Vec<u8>),
            Other(IgnoredAny),
        }

        let bytes = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => serde_json::from_str::<Vec<u8>>(&text).unwrap_or_default(),
            Raw::Array(bytes) => bytes,
            Raw::Other(_) => Vec::new(),
        };
        Ok(Self(bytes))
    }
}

// =============================================================================
// CHALLENGES
// =============================================================================

/// Text a validator signs to prove key ownership at signup.
pub fn signup_challenge(callback_id: &CallbackId, public_key: &str) -> String {
    format!("Signed message for {}, {}", callback_id, public_key)
}

/// Text a validator signs over a check result.
pub fn result_challenge(callback_id: &CallbackId) -> String {
    format!("Replying to {}", callback_id)
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Identity proof sent by a validator right after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub ip: String,
    pub public_key: String,
    pub callback_id: CallbackId,
    pub signed_message: SignatureBytes,
}

/// Hub acknowledgement of an admitted signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupAck {
    pub validator_id: ValidatorId,
    pub callback_id: CallbackId,
}

/// Check request dispatched to a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub url: String,
    pub callback_id: CallbackId,
    pub website_id: TargetId,
}

/// Signed check result returned by a validator.
///
/// `validator_id` and `website_id` are informational; the hub trusts the
/// values it recorded when dispatching the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateReport {
    pub callback_id: CallbackId,
    #[serde(default)]
    pub validator_id: Option<ValidatorId>,
    #[serde(default)]
    pub website_id: Option<TargetId>,
    pub status: CheckStatus,
    #[serde(alias = "latency")]
    pub latency_ms: u64,
    pub signed_message: SignatureBytes,
}

/// Human-readable failure notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

impl ErrorNotice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// ENVELOPES
// =============================================================================

/// A closed set of frames with a `type` tag.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Tags this side accepts.
    const TYPES: &'static [&'static str];

    /// Tag of this frame, for logs.
    fn message_type(&self) -> &'static str;
}

/// Frames a validator sends to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ValidatorMessage {
    Signup(SignupRequest),
    Validate(ValidateReport),
}

impl WireMessage for ValidatorMessage {
    const TYPES: &'static [&'static str] = &["signup", "validate"];

    fn message_type(&self) -> &'static str {
        match self {
            Self::Signup(_) => "signup",
            Self::Validate(_) => "validate",
        }
    }
}

/// Frames the hub sends to a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum HubMessage {
    Signup(SignupAck),
    Validate(ValidateRequest),
    Error(ErrorNotice),
}

impl HubMessage {
    /// Shorthand for an `error` frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorNotice::new(message))
    }
}

impl WireMessage for HubMessage {
    const TYPES: &'static [&'static str] = &["signup", "validate", "error"];

    fn message_type(&self) -> &'static str {
        match self {
            Self::Signup(_) => "signup",
            Self::Validate(_) => "validate",
            Self::Error(_) => "error",
        }
    }
}

/// Decode one text frame, classifying the failure.
pub fn decode<M: WireMessage>(text: &str) -> Result<M, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;

    let message_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    if !M::TYPES.contains(&message_type.as_str()) {
        return Err(ProtocolError::UnknownType(message_type));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        message_type,
        reason: e.to_string(),
    })
}

/// Encode one frame as JSON text.
pub fn encode<M: WireMessage>(message: &M) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Encode(e.to_string()))
}
