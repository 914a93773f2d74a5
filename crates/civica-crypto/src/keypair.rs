//! Process-lifetime enclave key pair.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use p256::{PublicKey, SecretKey, ecdh};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::{
    envelope::{EncryptedEnvelope, NONCE_SIZE, TAG_SIZE, derive_envelope_key},
    error::DecryptionError,
};

/// The enclave's P-256 key pair.
///
/// Generated exactly once per enclave process lifetime and owned by the
/// initialization context; pass it by reference into whatever needs it.
/// The private half is never serialized. Only the SEC1 public encoding
/// leaves the process, embedded in the attestation document so callers
/// can verify which enclave image they are encrypting to.
///
/// # Concurrency
///
/// Immutable after construction. [`open`](Self::open) takes `&self` and
/// shares no mutable state across calls, so concurrent requests need no
/// locking.
pub struct EnclaveKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl EnclaveKeyPair {
    /// Generate a fresh key pair from OS randomness.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// SEC1 encoding of the public key.
    ///
    /// This is the only key material that may leave the process.
    pub fn public_key_sec1(&self) -> Vec<u8> {
        self.public.to_sec1_bytes().to_vec()
    }

    /// Open an envelope sealed against this key pair's public key.
    ///
    /// Performs ECDH with the envelope's ephemeral public key, derives
    /// the AES-256-GCM key via HKDF-SHA256, and verifies the 128-bit tag
    /// before releasing any plaintext. The derived key is zeroized before
    /// this method returns; nothing is cached between calls.
    ///
    /// # Errors
    ///
    /// - [`DecryptionError::MalformedPublicKey`]: ephemeral key is not a
    ///   valid SEC1 P-256 point
    /// - [`DecryptionError::TruncatedCiphertext`]: ciphertext shorter
    ///   than the authentication tag
    /// - [`DecryptionError::AuthenticationFailed`]: tag mismatch (wrong
    ///   key or tampered data)
    pub fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, DecryptionError> {
        if envelope.ciphertext.len() < TAG_SIZE {
            return Err(DecryptionError::TruncatedCiphertext {
                len: envelope.ciphertext.len(),
                tag_size: TAG_SIZE,
            });
        }

        let sender_public = PublicKey::from_sec1_bytes(&envelope.ephemeral_public_key).map_err(
            |_| DecryptionError::MalformedPublicKey { len: envelope.ephemeral_public_key.len() },
        )?;

        let shared =
            ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), sender_public.as_affine());
        // generic-array 0.14 (via aes-gcm 0.10) deprecates as_slice/from_slice
        #[allow(deprecated)]
        let mut key = derive_envelope_key(shared.raw_secret_bytes().as_slice());

        let cipher = Aes256Gcm::new((&key).into());
        key.zeroize();

        #[allow(deprecated)]
        cipher
            .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
            .map_err(|_| DecryptionError::AuthenticationFailed)
    }

    /// Nonce length accepted by [`open`](Self::open), re-exported for
    /// request validation at the service boundary.
    pub const fn nonce_size() -> usize {
        NONCE_SIZE
    }
}

impl std::fmt::Debug for EnclaveKeyPair {
    /// Debug output deliberately omits all key material.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnclaveKeyPair").finish_non_exhaustive()
    }
}
