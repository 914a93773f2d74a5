//! Civica enclave decryption service.
//!
//! The only component that ever sees message plaintext. It decrypts
//! sealed envelopes with the process key pair, forwards the recovered
//! message to the legislative API, and attaches a fresh attestation
//! token to every response so callers can verify which enclave image
//! handled their data.
//!
//! # Security
//!
//! - The key pair is generated at startup and never serialized
//! - Plaintext lives only inside one handler invocation and is zeroized
//! - Error responses and logs carry structural diagnostics only

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod http;
pub mod metrics;
pub mod service;

mod error;

pub use error::EnclaveError;
pub use metrics::EnclaveMetrics;
pub use service::{DecryptionService, ForwardResponse};
