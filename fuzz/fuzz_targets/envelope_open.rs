//! Fuzz target for envelope decryption
//!
//! This fuzzer opens attacker-shaped envelopes against a fixed enclave
//! key pair to find:
//! - Panics on malformed SEC1 points
//! - Length-handling bugs around the authentication tag boundary
//! - Any path that releases plaintext without a verified tag
//!
//! Decryption should NEVER panic; every malformed envelope must return
//! an error.

#![no_main]

use std::sync::OnceLock;

use arbitrary::Arbitrary;
use civica_crypto::{EnclaveKeyPair, EncryptedEnvelope, NONCE_SIZE};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzEnvelope {
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_SIZE],
    ephemeral_public_key: Vec<u8>,
}

fn keypair() -> &'static EnclaveKeyPair {
    static KEYPAIR: OnceLock<EnclaveKeyPair> = OnceLock::new();
    KEYPAIR.get_or_init(EnclaveKeyPair::generate)
}

fuzz_target!(|input: FuzzEnvelope| {
    let envelope = EncryptedEnvelope {
        ciphertext: input.ciphertext,
        nonce: input.nonce,
        ephemeral_public_key: input.ephemeral_public_key,
        template_id: "tpl-fuzz".to_string(),
        recipient: "office-fuzz".to_string(),
    };

    // Random ciphertext essentially never authenticates; the interesting
    // outcomes are the error paths.
    let _ = keypair().open(&envelope);
});
