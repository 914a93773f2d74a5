//! Civica pipeline core.
//!
//! Domain types and resilience primitives shared across the delivery
//! pipeline: the queued submission job model, chamber-specific limits,
//! the circuit breaker state machine, the fixed-window rate limiter, and
//! the clock abstraction that keeps both deterministic under test.
//!
//! # Architecture
//!
//! Everything here is a constructed state object: the breaker and
//! limiter are built by the process initialization context and passed by
//! reference into the workers, never reached through module-level
//! globals. That makes per-test isolation trivial and keeps the
//! per-process scope of the in-memory breaker visible to the reader
//! instead of hidden in a static.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod breaker;
pub mod clock;
pub mod job;
pub mod limiter;

mod chamber;
mod error;

pub use breaker::{BreakerConfig, BreakerError, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use chamber::Chamber;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CircuitOpenError, ValidationError};
pub use job::{JobPhase, Priority, SubmissionJob};
pub use limiter::{
    FixedWindowLimiter, MemoryRateLimitStore, RateLimitConfig, RateLimitDecision, RateLimitStore,
    RateLimitStoreError, WindowSlot,
};
