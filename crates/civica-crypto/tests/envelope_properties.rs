//! Property tests for envelope seal/open.
//!
//! Verifies the core pipeline guarantee: for every message sealed against
//! the enclave's published public key, opening recovers the exact bytes,
//! and any single-bit corruption of ciphertext or tag is rejected as an
//! authentication failure rather than decrypting to different plaintext.

use civica_crypto::{DecryptionError, EnclaveKeyPair, seal};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// open(seal(m, pub)) == m for arbitrary message bytes.
    #[test]
    fn prop_seal_open_roundtrip(message in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let keypair = EnclaveKeyPair::generate();
        let envelope = seal(&message, &keypair.public_key_sec1(), "tpl", "office").unwrap();

        let opened = keypair.open(&envelope).unwrap();
        prop_assert_eq!(opened, message);
    }

    /// Flipping any single bit anywhere in the ciphertext (body or tag)
    /// causes an authentication failure, never different plaintext.
    #[test]
    fn prop_bit_flip_rejected(
        message in proptest::collection::vec(any::<u8>(), 1..256),
        flip_byte in any::<prop::sample::Index>(),
        flip_bit in 0u8..8,
    ) {
        let keypair = EnclaveKeyPair::generate();
        let mut envelope = seal(&message, &keypair.public_key_sec1(), "tpl", "office").unwrap();

        let index = flip_byte.index(envelope.ciphertext.len());
        envelope.ciphertext[index] ^= 1 << flip_bit;

        let result = keypair.open(&envelope);
        prop_assert!(matches!(result, Err(DecryptionError::AuthenticationFailed)));
    }

    /// Corrupting the nonce also fails authentication.
    #[test]
    fn prop_nonce_flip_rejected(
        message in proptest::collection::vec(any::<u8>(), 1..256),
        flip_byte in 0usize..12,
    ) {
        let keypair = EnclaveKeyPair::generate();
        let mut envelope = seal(&message, &keypair.public_key_sec1(), "tpl", "office").unwrap();

        envelope.nonce[flip_byte] ^= 0x01;

        let result = keypair.open(&envelope);
        prop_assert!(matches!(result, Err(DecryptionError::AuthenticationFailed)));
    }
}
