//! Error types for attestation issuance, parsing, and verification.

use thiserror::Error;

/// Errors while producing an attestation token.
///
/// Issuance failure is fatal for the request that needed the token: the
/// decryption service fails the request rather than deliver plaintext
/// without attestation available to return to the caller.
#[derive(Debug, Error)]
pub enum AttestationError {
    /// Local metadata endpoint could not be reached or returned an error
    #[error("metadata endpoint request failed: {0}")]
    MetadataEndpoint(#[from] reqwest::Error),

    /// Metadata endpoint answered with a non-success status
    #[error("metadata endpoint returned status {status}")]
    MetadataStatus {
        /// HTTP status code returned
        status: u16,
    },

    /// Identity token was not a three-part signed token
    #[error("malformed identity token: {reason}")]
    TokenFormat {
        /// Structural diagnostic
        reason: String,
    },

    /// NSM device error
    #[error("NSM error: {reason}")]
    Nsm {
        /// Driver diagnostic
        reason: String,
    },
}

/// Errors from the attestation document parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input decodes as neither a COSE/CBOR document nor an identity token
    #[error("unrecognized attestation encoding: {reason}")]
    UnrecognizedEncoding {
        /// Structural diagnostic
        reason: String,
    },

    /// Document decoded but the code measurement field is absent
    #[error("attestation document has no code measurement (PCR0)")]
    MissingMeasurement,
}

/// Errors from verifying a presented attestation token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// No token was presented
    #[error("attestation token missing")]
    MissingToken,

    /// Token could not be decoded by any supported scheme
    #[error("attestation token undecodable: {0}")]
    Undecodable(ParseError),

    /// Decoded code measurement is not in the allow-list
    #[error("code measurement not in allow-list: {measurement}")]
    MeasurementNotAllowed {
        /// The rejected measurement (hex)
        measurement: String,
    },

    /// A mock token was presented but mock acceptance is disabled
    #[error("mock attestation token rejected by policy")]
    MockNotPermitted,
}

impl VerifyError {
    /// HTTP status the proxy returns for this failure: 401 for an absent
    /// token, 403 for everything else.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingToken => 401,
            Self::Undecodable(_) | Self::MeasurementNotAllowed { .. } | Self::MockNotPermitted => {
                403
            },
        }
    }
}
