//! Civica attestation.
//!
//! Produces and validates proof that the decryption service is running a
//! specific, unmodified enclave image, with the enclave's public key
//! bound into the proof.
//!
//! # Components
//!
//! - [`Provider`]: runtime platform, probed once at startup
//! - [`AttestationIssuer`]: requests platform-specific proof (cloud
//!   identity token, NSM document, or a clearly labeled mock)
//! - [`parser`]: the single module that understands document encodings;
//!   everything else sees only [`AttestationClaims`]
//! - [`AttestationVerifier`]: allow-list policy over the decoded code
//!   measurement, with an explicit opt-in for mock tokens
//!
//! Tokens are created fresh per request that needs one and never cached
//! across unrelated requests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod parser;

mod claims;
mod error;
mod issuer;
mod nsm;
mod provider;
mod token;
mod verifier;

pub use claims::AttestationClaims;
pub use error::{AttestationError, ParseError, VerifyError};
pub use issuer::{AttestationIssuer, IssuerConfig};
pub use provider::Provider;
pub use token::{AttestationToken, MOCK_WARNING, build_mock_token, parse_mock_token};
pub use verifier::{AttestationVerifier, VerifiedAttestation, VerifierPolicy};
