//! Validator identity keys.
//!
//! The secret key lives in the `PRIVATE_KEY` environment variable as a JSON
//! array of the 64 keypair bytes (32-byte seed followed by the public key),
//! e.g. `PRIVATE_KEY=[12,250,...]`.

use shared_crypto::{CryptoError, Ed25519KeyPair, KEYPAIR_LENGTH};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable holding the secret key
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("PRIVATE_KEY is not a JSON array of numbers: {0}")]
    Format(#[from] serde_json::Error),

    #[error("invalid secret key length: expected 64 bytes, got {0}")]
    Length(usize),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Where the running identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    Generated,
}

/// Parse a JSON byte array into a keypair.
pub fn parse_private_key(text: &str) -> Result<Ed25519KeyPair, KeyError> {
    let bytes: Vec<u8> = serde_json::from_str(text.trim())?;
    if bytes.len() != KEYPAIR_LENGTH {
        return Err(KeyError::Length(bytes.len()));
    }
    Ok(Ed25519KeyPair::from_keypair_bytes(&bytes)?)
}

/// Render the keypair as the JSON array stored in `PRIVATE_KEY`.
pub fn encode_private_key(keypair: &Ed25519KeyPair) -> String {
    let bytes = keypair.to_keypair_bytes();
    let parts: Vec<String> = bytes.iter().map(u8::to_string).collect();
    format!("[{}]", parts.join(","))
}

/// The `.env` line for `keypair`.
pub fn env_line(keypair: &Ed25519KeyPair) -> String {
    format!("{}={}\n", PRIVATE_KEY_ENV, encode_private_key(keypair))
}

/// Use the configured key, or generate a fresh one when it is absent or unusable.
pub fn load_or_generate(private_key: Option<&str>) -> (Ed25519KeyPair, KeySource) {
    match private_key.map(parse_private_key) {
        Some(Ok(keypair)) => {
            info!(public_key = %keypair.public_key(), "Loaded validator key");
            (keypair, KeySource::Environment)
        }
        Some(Err(e)) => {
            warn!(error = %e, "Configured key unusable, generating a new keypair");
            (Ed25519KeyPair::generate(), KeySource::Generated)
        }
        None => {
            info!("No existing secret key found, generating a new keypair");
            (Ed25519KeyPair::generate(), KeySource::Generated)
        }
    }
}

/// Write the `.env` line for `keypair` to `path`, replacing the file.
pub fn write_env_file(keypair: &Ed25519KeyPair, path: &Path) -> Result<(), KeyError> {
    std::fs::write(path, env_line(keypair)).map_err(|source| KeyError::Write {
        path: path.display().to_string(),
        source,
    })
}
