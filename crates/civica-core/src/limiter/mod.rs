//! Distributed fixed-window rate limiting.
//!
//! Bounds submissions per legislative office or per user. The window
//! arithmetic lives here; the counter storage is behind
//! [`RateLimitStore`] so production can back it with a shared store
//! while tests use [`MemoryRateLimitStore`].
//!
//! On store failure the policy is fail-open: the request is allowed and
//! a warning logged. Availability of submissions takes precedence over
//! strict limiting.

mod memory;
mod store;

pub use memory::MemoryRateLimitStore;
pub use store::{RateLimitRecord, RateLimitStore, RateLimitStoreError, WindowSlot};

use std::time::Duration;

use crate::clock::Clock;

/// Per-action rate limit configuration.
///
/// Ceilings differ materially per chamber (a handful per minute per
/// office vs. a larger budget per hour per user), so these are always
/// supplied by the caller, never hardcoded at the call site.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Fixed window length
    pub window: Duration,
    /// Maximum requests allowed inside one window
    pub max_requests: u32,
    /// Extra lifetime past the window end before the record may expire
    pub grace: Duration,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the current window after this one
    pub remaining: u32,
    /// How long until the window rolls over, set when denied
    pub retry_after_millis: Option<u64>,
}

/// Fixed-window counter keyed by `{action}#{identifier}`.
pub struct FixedWindowLimiter<S: RateLimitStore, C: Clock> {
    /// Namespace distinguishing limiters sharing one store
    action: String,
    config: RateLimitConfig,
    store: S,
    clock: C,
}

impl<S: RateLimitStore, C: Clock> FixedWindowLimiter<S, C> {
    /// Create a limiter for one action namespace.
    pub fn new(action: impl Into<String>, config: RateLimitConfig, store: S, clock: C) -> Self {
        Self { action: action.into(), config, store, clock }
    }

    /// Check and count one request for `identifier`.
    ///
    /// Window boundary is `floor(now / window) * window`. A fresh or
    /// stale-window record starts at count 1 and is allowed; an
    /// in-window record below the ceiling is atomically incremented and
    /// allowed; at the ceiling the request is denied without
    /// incrementing.
    ///
    /// Store failures allow the request (fail-open) with a logged
    /// warning.
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let window_millis = self.config.window.as_millis() as u64;
        let window_start = (now / window_millis) * window_millis;
        let expires_at = window_start + window_millis + self.config.grace.as_millis() as u64;

        let key = format!("{}#{}", self.action, identifier);

        match self.store.try_increment(&key, window_start, self.config.max_requests, expires_at) {
            Ok(slot) => {
                if slot.allowed {
                    RateLimitDecision {
                        allowed: true,
                        remaining: self.config.max_requests.saturating_sub(slot.count),
                        retry_after_millis: None,
                    }
                } else {
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        retry_after_millis: Some((window_start + window_millis).saturating_sub(now)),
                    }
                }
            },
            Err(err) => {
                tracing::warn!(
                    action = %self.action,
                    error = %err,
                    "rate limit store unavailable, failing open"
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: self.config.max_requests.saturating_sub(1),
                    retry_after_millis: None,
                }
            },
        }
    }
}
