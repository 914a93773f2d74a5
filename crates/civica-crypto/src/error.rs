//! Error types for envelope operations

use thiserror::Error;

/// Errors from opening an encrypted envelope.
///
/// None of these variants ever carry plaintext or key material. Callers
/// must not log partial decryption output on failure; there is none to
/// log, and the variants here are safe to surface verbatim.
#[derive(Debug, Error)]
pub enum DecryptionError {
    /// Ephemeral public key is not a valid SEC1-encoded P-256 point
    #[error("malformed ephemeral public key ({len} bytes)")]
    MalformedPublicKey {
        /// Length of the rejected key encoding
        len: usize,
    },

    /// Nonce is not exactly 12 bytes
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Required nonce length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Ciphertext is shorter than the authentication tag
    #[error("truncated ciphertext: {len} bytes is shorter than the {tag_size}-byte tag")]
    TruncatedCiphertext {
        /// Length of the rejected ciphertext
        len: usize,
        /// Minimum length (the AEAD tag size)
        tag_size: usize,
    },

    /// Authentication tag did not verify (wrong key or tampered data)
    #[error("authentication failed")]
    AuthenticationFailed,
}
