//! Encrypted envelope format and client-side sealing.
//!
//! An envelope is what a sender submits: AEAD output with the tag
//! appended, a 12-byte nonce, the sender's single-use ephemeral public
//! key, and routing metadata (template, recipient office). It is consumed
//! exactly once by the decryption service and never stored.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use p256::{PublicKey, ecdh::EphemeralSecret};
use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroize;

use crate::error::DecryptionError;

/// AES-GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes (128-bit tag).
pub const TAG_SIZE: usize = 16;

/// Info label for HKDF expansion. Empty per the wire contract: the
/// sender side derives with empty salt and empty info, so the enclave
/// must match exactly.
const HKDF_INFO: &[u8] = b"";

/// An encrypted message envelope.
///
/// The ciphertext carries the 16-byte Poly-style GCM tag appended to the
/// encrypted body. `ephemeral_public_key` is the SEC1 encoding of the
/// sender's single-use P-256 key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// Encrypted body with the authentication tag appended
    pub ciphertext: Vec<u8>,
    /// AES-GCM nonce
    pub nonce: [u8; NONCE_SIZE],
    /// SEC1-encoded sender ephemeral P-256 public key
    pub ephemeral_public_key: Vec<u8>,
    /// Message template identifier (routing metadata, not secret)
    pub template_id: String,
    /// Recipient office descriptor (routing metadata, not secret)
    pub recipient: String,
}

impl EncryptedEnvelope {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

/// Seal a message against a recipient's published P-256 public key.
///
/// This is the sender-side counterpart of
/// [`EnclaveKeyPair::open`](crate::EnclaveKeyPair::open): a fresh
/// ephemeral key pair is generated per call, ECDH runs against the
/// recipient key, and the derived AES-256-GCM key encrypts the plaintext
/// under a random nonce.
///
/// # Errors
///
/// Returns [`DecryptionError::MalformedPublicKey`] if `recipient_public`
/// is not a valid SEC1 P-256 encoding.
pub fn seal(
    plaintext: &[u8],
    recipient_public: &[u8],
    template_id: &str,
    recipient: &str,
) -> Result<EncryptedEnvelope, DecryptionError> {
    let recipient_key = PublicKey::from_sec1_bytes(recipient_public)
        .map_err(|_| DecryptionError::MalformedPublicKey { len: recipient_public.len() })?;

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key();

    let shared = ephemeral.diffie_hellman(&recipient_key);
    // generic-array 0.14 (via aes-gcm 0.10) deprecates as_slice/from_slice
    #[allow(deprecated)]
    let mut key = derive_envelope_key(shared.raw_secret_bytes().as_slice());

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new((&key).into());
    key.zeroize();

    #[allow(deprecated)]
    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(&nonce), plaintext) else {
        unreachable!("AES-GCM encryption cannot fail with valid key and nonce");
    };

    Ok(EncryptedEnvelope {
        ciphertext,
        nonce,
        ephemeral_public_key: ephemeral_public.to_sec1_bytes().to_vec(),
        template_id: template_id.to_string(),
        recipient: recipient.to_string(),
    })
}

/// Derive the 256-bit envelope key from an ECDH shared secret.
///
/// HKDF-SHA256 with empty salt and empty info. Both sides of the wire
/// contract derive identically; changing either parameter is a breaking
/// protocol change.
pub(crate) fn derive_envelope_key(shared_secret: &[u8]) -> [u8; 32] {
    let hkdf = hkdf::Hkdf::<sha2::Sha256>::new(None, shared_secret);

    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(HKDF_INFO, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    key
}
