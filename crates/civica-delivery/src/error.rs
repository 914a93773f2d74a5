//! Delivery error taxonomy.
//!
//! Every error carries an explicit retryability classification consumed
//! by the retry loop and the workers. Validation and malformed-response
//! failures never retry; transport failures and throttling statuses do.

use std::time::Duration;

use thiserror::Error;

/// Errors from submitting to the legislative API, directly or via the
/// proxy.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Payload failed pre-flight structural validation. Never retried.
    #[error("payload validation failed: {reason}")]
    Validation {
        /// Which element was missing or malformed
        reason: String,
    },

    /// Upstream answered with a non-success status.
    #[error("upstream returned status {status}")]
    UpstreamStatus {
        /// HTTP status code
        status: u16,
        /// Whether the status is transient (429, 408, 5xx)
        retryable: bool,
        /// Response body, for diagnostics. Upstream error bodies carry
        /// no message plaintext.
        body: String,
    },

    /// The request could not be completed at the transport level.
    #[error("network failure: {reason}")]
    Network {
        /// Transport diagnostic
        reason: String,
    },

    /// The request was aborted after the configured duration.
    #[error("request timed out after {after:?}")]
    Timeout {
        /// Configured per-attempt timeout
        after: Duration,
    },

    /// Upstream answered but the response body could not be read or
    /// decoded. Never retried; resubmitting a possibly delivered
    /// message risks duplicates.
    #[error("malformed upstream response: {reason}")]
    MalformedResponse {
        /// Decoding diagnostic
        reason: String,
    },

    /// All retry attempts were spent.
    #[error("retries exhausted after {attempts} attempts in {elapsed_millis}ms: {last_error}")]
    RetriesExhausted {
        /// Total attempts made, including the first
        attempts: u32,
        /// Wall time spent across all attempts and backoff sleeps
        elapsed_millis: u64,
        /// Display form of the final attempt's error
        last_error: String,
    },
}

impl DeliveryError {
    /// Whether the retry loop may attempt this call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::UpstreamStatus { retryable, .. } => *retryable,
            Self::Validation { .. }
            | Self::MalformedResponse { .. }
            | Self::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_retryable() {
        assert!(DeliveryError::Network { reason: "reset".into() }.is_retryable());
        assert!(DeliveryError::Timeout { after: Duration::from_secs(30) }.is_retryable());
    }

    #[test]
    fn status_retryability_follows_the_flag() {
        let throttled =
            DeliveryError::UpstreamStatus { status: 429, retryable: true, body: String::new() };
        let rejected =
            DeliveryError::UpstreamStatus { status: 400, retryable: false, body: String::new() };
        assert!(throttled.is_retryable());
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn terminal_classes_never_retry() {
        assert!(!DeliveryError::Validation { reason: "no subject".into() }.is_retryable());
        assert!(!DeliveryError::MalformedResponse { reason: "bad utf-8".into() }.is_retryable());
        assert!(
            !DeliveryError::RetriesExhausted {
                attempts: 4,
                elapsed_millis: 9_000,
                last_error: "status 503".into()
            }
            .is_retryable()
        );
    }
}
