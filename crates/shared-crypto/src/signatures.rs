//! # Ed25519 Signatures
//!
//! Twisted Edwards curve signatures with deterministic nonces.
//!
//! ## Security Properties
//!
//! - No RNG dependency when signing (deterministic nonce from message)
//! - Public keys are validated as curve points on construction
//! - Secret material is zeroized on drop

use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;
use zeroize::Zeroize;

/// Length of an encoded public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of a detached signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of a stored secret key (seed || public key).
pub const KEYPAIR_LENGTH: usize = 64;

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl Ed25519PublicKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Result<Self, CryptoError> {
        // Validate it's a valid point
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Parse the base58 text form used on the wire.
    pub fn from_base58(text: &str) -> Result<Self, CryptoError> {
        let decoded = bs58::decode(text)
            .into_vec()
            .map_err(|e| CryptoError::InvalidBase58(e.to_string()))?;

        let bytes: [u8; PUBLIC_KEY_LENGTH] =
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PUBLIC_KEY_LENGTH,
                    actual: decoded.len(),
                })?;

        Self::from_bytes(bytes)
    }

    /// Render as base58.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature([u8; SIGNATURE_LENGTH]);

impl Ed25519Signature {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create from a slice of arbitrary length, rejecting anything but 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; SIGNATURE_LENGTH] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureFormat(bytes.len()))?;
        Ok(Self(array))
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// Copy into an owned byte vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Ed25519 keypair.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self { signing_key }
    }

    /// Create from the 64-byte stored form (seed || public key).
    ///
    /// The trailing public key must match the one derived from the seed.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; KEYPAIR_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEYPAIR_LENGTH,
                    actual: bytes.len(),
                })?;

        let signing_key =
            SigningKey::from_keypair_bytes(&array).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Export the 64-byte stored form (seed || public key).
    pub fn to_keypair_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.signing_key.to_keypair_bytes()
    }

    /// Get public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        Ed25519PublicKey(verifying_key.to_bytes())
    }

    /// Sign a message (deterministic - no RNG needed).
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Get secret seed (for serialization).
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &self.public_key().to_base58())
            .finish_non_exhaustive()
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = Ed25519KeyPair::generate();
        let message = b"Replying to 3f1c";

        let signature = keypair.sign(message);
        let result = keypair.public_key().verify(message, &signature);

        assert!(result.is_ok());
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair1 = Ed25519KeyPair::generate();
        let keypair2 = Ed25519KeyPair::generate();
        let message = b"test";

        let signature = keypair1.sign(message);
        let result = keypair2.public_key().verify(message, &signature);

        assert_eq!(result, Err(CryptoError::SignatureVerificationFailed));
    }

    #[test]
    fn test_base58_roundtrip() {
        let keypair = Ed25519KeyPair::from_seed([7u8; 32]);
        let encoded = keypair.public_key().to_base58();

        let decoded = Ed25519PublicKey::from_base58(&encoded).unwrap();
        assert_eq!(decoded, keypair.public_key());
        assert_eq!(decoded.to_string(), encoded);
    }

    #[test]
    fn test_base58_rejects_bad_text() {
        assert!(matches!(
            Ed25519PublicKey::from_base58("0OIl"),
            Err(CryptoError::InvalidBase58(_))
        ));
        assert!(matches!(
            Ed25519PublicKey::from_base58("3yZe7d"),
            Err(CryptoError::InvalidKeyLength { expected: 32, .. })
        ));
    }

    #[test]
    fn test_keypair_bytes_layout() {
        let keypair = Ed25519KeyPair::from_seed([0x11u8; 32]);
        let stored = keypair.to_keypair_bytes();

        assert_eq!(&stored[..32], &[0x11u8; 32]);
        assert_eq!(&stored[32..], keypair.public_key().as_bytes());

        let restored = Ed25519KeyPair::from_keypair_bytes(&stored).unwrap();
        assert_eq!(restored.public_key(), keypair.public_key());
    }

    #[test]
    fn test_keypair_bytes_mismatched_public_half() {
        let mut stored = Ed25519KeyPair::from_seed([0x22u8; 32]).to_keypair_bytes();
        stored[40] ^= 0xFF;

        assert_eq!(
            Ed25519KeyPair::from_keypair_bytes(&stored).unwrap_err(),
            CryptoError::InvalidPrivateKey
        );
        assert!(matches!(
            Ed25519KeyPair::from_keypair_bytes(&stored[..10]),
            Err(CryptoError::InvalidKeyLength { expected: 64, actual: 10 })
        ));
    }

    #[test]
    fn test_signature_from_slice_length() {
        assert!(Ed25519Signature::from_slice(&[0u8; 64]).is_ok());
        assert_eq!(
            Ed25519Signature::from_slice(&[0u8; 63]),
            Err(CryptoError::InvalidSignatureFormat(63))
        );
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Ed25519KeyPair::from_seed([0xABu8; 32]);
        let message = b"deterministic test";

        let sig1 = keypair.sign(message);
        let sig2 = keypair.sign(message);

        assert_eq!(hex::encode(sig1.as_bytes()), hex::encode(sig2.as_bytes()));
    }
}
