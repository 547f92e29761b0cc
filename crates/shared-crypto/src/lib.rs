//! # Shared Crypto - Validator Identity Primitives
//!
//! Validators are identified by an Ed25519 public key rendered as base58.
//! Every claim a validator makes (signup, check result) carries a detached
//! signature over a fixed challenge string.
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `signatures` | Ed25519 keypairs, public keys, signatures |
//! | `verify` | Total `verify(message, key, signature) -> bool` used by the hub |
//!
//! ## Key Formats
//!
//! - Public keys travel as base58 text (32 bytes decoded).
//! - Secret keys are stored as 64 bytes: 32-byte seed followed by the
//!   32-byte public key.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod signatures;
pub mod verify;

// Re-exports
pub use errors::CryptoError;
pub use signatures::{
    Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, KEYPAIR_LENGTH, PUBLIC_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
pub use verify::verify;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
