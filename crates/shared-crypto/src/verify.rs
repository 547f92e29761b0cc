//! Total signature check over untrusted wire input.
//!
//! The hub never trusts a validator claim until `verify` returns `true`.
//! Every failure mode (bad base58, wrong key length, off-curve point, wrong
//! signature length, mismatched signature) collapses to `false`.

use crate::{Ed25519PublicKey, Ed25519Signature};

/// Check a detached Ed25519 signature over the UTF-8 bytes of `message`.
pub fn verify(message: &str, public_key_b58: &str, signature: &[u8]) -> bool {
    let Ok(public_key) = Ed25519PublicKey::from_base58(public_key_b58) else {
        return false;
    };
    let Ok(signature) = Ed25519Signature::from_slice(signature) else {
        return false;
    };

    public_key.verify(message.as_bytes(), &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ed25519KeyPair;
    use proptest::prelude::*;

    fn signed(message: &str, seed: [u8; 32]) -> (String, Vec<u8>) {
        let keypair = Ed25519KeyPair::from_seed(seed);
        let signature = keypair.sign(message.as_bytes()).to_vec();
        (keypair.public_key().to_base58(), signature)
    }

    #[test]
    fn test_matching_triple_verifies() {
        let (key, sig) = signed("Replying to abc", [1u8; 32]);
        assert!(verify("Replying to abc", &key, &sig));
    }

    #[test]
    fn test_malformed_inputs_are_false() {
        let (key, sig) = signed("hello", [2u8; 32]);

        assert!(!verify("hello", "not base58 0OIl", &sig));
        assert!(!verify("hello", "", &sig));
        assert!(!verify("hello", &key, &[]));
        assert!(!verify("hello", &key, &sig[..63]));

        let mut long = sig.clone();
        long.push(0);
        assert!(!verify("hello", &key, &long));
    }

    #[test]
    fn test_short_key_is_false() {
        let (_, sig) = signed("hello", [3u8; 32]);
        let short = bs58::encode([9u8; 31]).into_string();
        assert!(!verify("hello", &short, &sig));
    }

    proptest! {
        #[test]
        fn prop_message_mutation_fails(
            seed in any::<[u8; 32]>(),
            message in "[ -~]{1,64}",
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let (key, sig) = signed(&message, seed);
            prop_assert!(verify(&message, &key, &sig));

            let mut bytes = message.clone().into_bytes();
            let i = index.index(bytes.len());
            bytes[i] ^= flip;
            if let Ok(mutated) = String::from_utf8(bytes) {
                prop_assert!(!verify(&mutated, &key, &sig));
            }
        }

        #[test]
        fn prop_signature_mutation_fails(
            seed in any::<[u8; 32]>(),
            index in 0usize..64,
            flip in 1u8..=255,
        ) {
            let message = "Signed message for 1b4e, key";
            let (key, mut sig) = signed(message, seed);
            sig[index] ^= flip;
            prop_assert!(!verify(message, &key, &sig));
        }

        #[test]
        fn prop_public_key_mutation_fails(
            seed in any::<[u8; 32]>(),
            index in 0usize..32,
            flip in 1u8..=255,
        ) {
            let message = "Replying to 7d20";
            let keypair = Ed25519KeyPair::from_seed(seed);
            let sig = keypair.sign(message.as_bytes()).to_vec();

            let mut key_bytes = *keypair.public_key().as_bytes();
            key_bytes[index] ^= flip;
            let mutated_key = bs58::encode(key_bytes).into_string();
            prop_assert!(!verify(message, &mutated_key, &sig));
        }
    }
}
