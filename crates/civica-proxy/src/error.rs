//! Proxy error mapping.

use civica_attest::VerifyError;
use thiserror::Error;

/// Errors from handling a relay request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Attestation verification failed; the body is never relayed.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// `X-Target-Endpoint` is absent or not a parseable URL
    #[error("invalid target endpoint: {reason}")]
    InvalidTarget {
        /// Structural diagnostic
        reason: String,
    },

    /// Target host is not in the fixed allow-list
    #[error("target host not allowed: {host}")]
    TargetNotAllowed {
        /// The rejected host
        host: String,
    },

    /// Upstream could not be reached
    #[error("upstream relay failed: {reason}")]
    Upstream {
        /// Transport diagnostic
        reason: String,
    },
}

impl ProxyError {
    /// HTTP status of the error response.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Verify(err) => err.http_status(),
            Self::InvalidTarget { .. } => 400,
            Self::TargetNotAllowed { .. } => 403,
            Self::Upstream { .. } => 502,
        }
    }
}
