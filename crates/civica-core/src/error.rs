//! Shared error types for the pipeline core.

use thiserror::Error;

/// A malformed job or request. Non-retryable: redelivering the same
/// payload can never succeed, so callers surface this immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is absent or empty
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the absent field
        field: &'static str,
    },

    /// Payload could not be parsed at all
    #[error("malformed payload: {reason}")]
    Malformed {
        /// Parser diagnostic (never message content)
        reason: String,
    },
}

/// The circuit breaker rejected a call without invoking the wrapped
/// function.
///
/// Deliberately a distinct type from upstream delivery errors so workers
/// never misreport a fast-fail as a legislative-API rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit open: retry scheduled at {retry_at_millis} ms epoch")]
pub struct CircuitOpenError {
    /// Wall-clock time (ms since epoch) when the next probe is allowed
    pub retry_at_millis: u64,
}
