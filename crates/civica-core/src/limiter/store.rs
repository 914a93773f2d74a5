//! Counter storage behind the rate limiter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the underlying counter store.
///
/// The limiter treats every variant the same way (fail-open with a
/// warning); the split exists so operators can tell a missing table from
/// an unreachable store in logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitStoreError {
    /// Store could not be reached
    #[error("rate limit store unavailable: {reason}")]
    Unavailable {
        /// Transport-level diagnostic
        reason: String,
    },

    /// Store responded but the operation failed
    #[error("rate limit store operation failed: {reason}")]
    Operation {
        /// Store-level diagnostic
        reason: String,
    },
}

/// One persisted window counter.
///
/// `expires_at_millis` lets stores with TTL support clean records up
/// automatically after the window plus a grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    /// Window boundary this count belongs to (ms since epoch)
    pub window_start_millis: u64,
    /// Requests counted inside the window
    pub count: u32,
    /// When the record may be garbage-collected
    pub expires_at_millis: u64,
}

/// Result of a conditional increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSlot {
    /// Count after the operation (unchanged when denied)
    pub count: u32,
    /// Whether the increment was applied
    pub allowed: bool,
}

/// Storage abstraction for window counters.
///
/// Must be Clone (shared between limiters), Send + Sync, and atomic per
/// key: concurrent `try_increment` calls for one key must never lose an
/// increment or exceed the ceiling. Implementations backed by a shared
/// store give a true distributed limit; in-memory implementations are
/// per-process.
pub trait RateLimitStore: Clone + Send + Sync + 'static {
    /// Conditionally count one request.
    ///
    /// - No record, or a record from a stale window, or an expired
    ///   record: reset to count 1 for `window_start_millis` and allow.
    /// - Record in the current window below `ceiling`: increment and
    ///   allow.
    /// - Otherwise: deny without changing the count.
    fn try_increment(
        &self,
        key: &str,
        window_start_millis: u64,
        ceiling: u32,
        expires_at_millis: u64,
    ) -> Result<WindowSlot, RateLimitStoreError>;
}
