//! Civica attestation-verifying proxy.
//!
//! Senate submissions must originate from an IP-allow-listed host, so
//! workers cannot call the legislative API directly. This proxy accepts
//! their submissions, verifies the presented attestation token against
//! an allow-list of trusted code measurements, checks the requested
//! target host against a fixed allow-list, and relays the XML body
//! verbatim.
//!
//! Verification failures return 401 (missing token) or 403 (everything
//! else) without relaying or logging the body.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod http;
pub mod service;

mod error;

pub use error::ProxyError;
pub use service::ProxyService;
