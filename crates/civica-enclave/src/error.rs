//! Service-level error mapping.

use civica_attest::AttestationError;
use civica_crypto::DecryptionError;
use civica_delivery::DeliveryError;
use thiserror::Error;

/// Errors surfaced by the decryption service.
///
/// # Security
///
/// Display strings become the `error` field of HTTP error responses.
/// No variant carries plaintext or key material; decryption failures
/// report only structural facts (lengths, tag mismatch).
#[derive(Debug, Error)]
pub enum EnclaveError {
    /// Request body was not a valid decrypt request
    #[error("bad request: {reason}")]
    BadRequest {
        /// Structural diagnostic (field name, encoding problem)
        reason: String,
    },

    /// Envelope failed to decrypt
    #[error("decryption failed: {0}")]
    Decryption(#[from] DecryptionError),

    /// Attestation token could not be issued
    #[error("attestation unavailable: {0}")]
    Attestation(#[from] AttestationError),

    /// Upstream forward failed
    #[error("forward failed: {0}")]
    Forward(#[from] DeliveryError),
}

impl EnclaveError {
    /// HTTP status for the error response.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } | Self::Decryption(_) => 400,
            Self::Attestation(_) => 500,
            Self::Forward(_) => 502,
        }
    }
}
