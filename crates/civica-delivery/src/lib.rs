//! Civica legislative API delivery.
//!
//! Builds the upstream XML payload, submits it (directly for the House,
//! through the attestation-verifying proxy for the Senate), and
//! classifies every failure with an explicit retryability flag. The
//! proxy path wraps each call in bounded exponential backoff with
//! jitter.
//!
//! Message plaintext flows through [`wire::CwcPayload`] and the request
//! body only; no error variant or log line here carries it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod wire;

mod client;
mod error;
mod proxy_client;

pub use client::{DeliveryClient, DeliveryResult};
pub use error::DeliveryError;
pub use proxy_client::{RetryConfig, RetryingProxyClient};
