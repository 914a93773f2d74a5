//! Circuit breaker for unreliable downstream dependencies.
//!
//! Wraps calls to the delivery proxy and the legislative API. Closed
//! passes calls through and counts consecutive failures; Open fails fast
//! without invoking the wrapped function until a wall-clock reset time;
//! HalfOpen admits exactly one probe whose outcome decides the next
//! state.
//!
//! The reset timer is re-checked on each call attempt, so no background
//! timer task exists. State is scoped to one warm process: across
//! horizontally scaled workers the protection is approximate, which is
//! an accepted limitation, not a bug.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::{clock::Clock, error::CircuitOpenError};

/// Breaker tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures (while Closed) that open the circuit
    pub failure_threshold: u32,
    /// Cooldown before the first HalfOpen probe is admitted
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(30) }
    }
}

/// Breaker state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through; failures are being counted
    Closed,
    /// Calls are rejected fast until the reset time
    Open,
    /// One probe call is admitted to test recovery
    HalfOpen,
}

/// Error from a breaker-wrapped call.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Rejected fast; the wrapped function was never invoked
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The wrapped function ran and failed
    #[error("wrapped call failed: {0}")]
    Inner(E),
}

/// Point-in-time view of breaker counters, for health reporting and
/// tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Current state
    pub state: BreakerState,
    /// Consecutive failures observed while Closed
    pub consecutive_failures: u32,
    /// Wall-clock ms of the most recent counted failure
    pub last_failure_at_millis: Option<u64>,
    /// Wall-clock ms when the next probe is admitted (Open only)
    pub next_retry_at_millis: Option<u64>,
    /// Calls that reached the execute entry point, including fast-fails
    pub total_invocations: u64,
    /// State transitions since construction (manual overrides included)
    pub state_transitions: u64,
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at_millis: Option<u64>,
    next_retry_at_millis: Option<u64>,
    total_invocations: u64,
    state_transitions: u64,
    probe_in_flight: bool,
}

/// Circuit breaker with injected clock.
///
/// Constructed by the process initialization context and passed by
/// reference into whatever wraps downstream calls; never a module-level
/// global.
pub struct CircuitBreaker<C: Clock> {
    /// Label used in transition logs (e.g. `"cwc-house"`)
    name: String,
    config: BreakerConfig,
    clock: C,
    inner: Mutex<BreakerInner>,
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker in the Closed state.
    pub fn new(name: impl Into<String>, config: BreakerConfig, clock: C) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                last_failure_at_millis: None,
                next_retry_at_millis: None,
                total_invocations: 0,
                state_transitions: 0,
                probe_in_flight: false,
            }),
        }
    }

    /// Run `op` under the breaker.
    ///
    /// Counts the invocation, fails fast with [`BreakerError::Open`]
    /// when the circuit is Open (without calling `op`), and records the
    /// outcome otherwise. The internal lock is never held across the
    /// await point.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.begin_call()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            },
            Err(err) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            },
        }
    }

    /// Admission check. Increments `total_invocations` on every call,
    /// including rejected ones, and performs the Open → HalfOpen
    /// transition when the reset time has elapsed.
    pub fn begin_call(&self) -> Result<(), CircuitOpenError> {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        inner.total_invocations += 1;

        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let retry_at = inner.next_retry_at_millis.unwrap_or(now);
                if now >= retry_at {
                    self.transition(&mut inner, BreakerState::HalfOpen);
                    inner.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(CircuitOpenError { retry_at_millis: retry_at })
                }
            },
            BreakerState::HalfOpen => {
                // Exactly one probe at a time; a second caller while the
                // probe is outstanding is rejected fast.
                if inner.probe_in_flight {
                    Err(CircuitOpenError {
                        retry_at_millis: inner.next_retry_at_millis.unwrap_or(now),
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            },
        }
    }

    /// Record a successful call admitted by [`begin_call`](Self::begin_call).
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            },
            BreakerState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.consecutive_failures = 0;
                inner.next_retry_at_millis = None;
                self.transition(&mut inner, BreakerState::Closed);
            },
            BreakerState::Open => {},
        }
    }

    /// Record a failed call admitted by [`begin_call`](Self::begin_call).
    ///
    /// Failures are counted only while Closed or HalfOpen. A single
    /// HalfOpen failure reopens the circuit and reschedules the retry
    /// time.
    pub fn record_failure(&self) {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                inner.last_failure_at_millis = Some(now);
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.next_retry_at_millis = Some(now + self.reset_timeout_millis());
                    self.transition(&mut inner, BreakerState::Open);
                }
            },
            BreakerState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.last_failure_at_millis = Some(now);
                inner.next_retry_at_millis = Some(now + self.reset_timeout_millis());
                self.transition(&mut inner, BreakerState::Open);
            },
            BreakerState::Open => {},
        }
    }

    /// Operational override: open the circuit immediately.
    pub fn force_open(&self) {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        inner.probe_in_flight = false;
        inner.next_retry_at_millis = Some(now + self.reset_timeout_millis());
        self.transition(&mut inner, BreakerState::Open);
    }

    /// Operational override: close the circuit and reset counters.
    pub fn force_close(&self) {
        let mut inner = self.lock();
        inner.probe_in_flight = false;
        inner.consecutive_failures = 0;
        inner.next_retry_at_millis = None;
        self.transition(&mut inner, BreakerState::Closed);
    }

    /// Operational override: allow the next call through as a probe.
    pub fn force_half_open(&self) {
        let mut inner = self.lock();
        inner.probe_in_flight = false;
        self.transition(&mut inner, BreakerState::HalfOpen);
    }

    /// Current counters and state.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_at_millis: inner.last_failure_at_millis,
            next_retry_at_millis: inner.next_retry_at_millis,
            total_invocations: inner.total_invocations,
            state_transitions: inner.state_transitions,
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: BreakerState) {
        if inner.state == to {
            return;
        }
        tracing::info!(
            breaker = %self.name,
            from = ?inner.state,
            to = ?to,
            consecutive_failures = inner.consecutive_failures,
            "circuit breaker state transition"
        );
        inner.state = to;
        inner.state_transitions += 1;
    }

    fn reset_timeout_millis(&self) -> u64 {
        self.config.reset_timeout.as_millis() as u64
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // Recover from poisoning: counters are plain integers, any
        // in-flight update is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker(clock: &ManualClock) -> CircuitBreaker<ManualClock> {
        CircuitBreaker::new(
            "test",
            BreakerConfig { failure_threshold: 3, reset_timeout: Duration::from_secs(10) },
            clock.clone(),
        )
    }

    fn fail_n(b: &CircuitBreaker<ManualClock>, n: u32) {
        for _ in 0..n {
            b.begin_call().unwrap();
            b.record_failure();
        }
    }

    #[test]
    fn closed_allows_calls_and_resets_failures_on_success() {
        let clock = ManualClock::starting_at(1_000);
        let b = breaker(&clock);

        fail_n(&b, 2);
        b.begin_call().unwrap();
        b.record_success();

        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
        assert_eq!(snap.total_invocations, 3);
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let clock = ManualClock::starting_at(1_000);
        let b = breaker(&clock);

        fail_n(&b, 3);

        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.next_retry_at_millis, Some(11_000));
    }

    #[test]
    fn open_rejects_without_invoking_wrapped_function() {
        let clock = ManualClock::starting_at(1_000);
        let b = breaker(&clock);
        fail_n(&b, 3);

        let err = b.begin_call().unwrap_err();
        assert_eq!(err.retry_at_millis, 11_000);

        // Rejected fast-fail calls still count as invocations.
        assert_eq!(b.snapshot().total_invocations, 4);
    }

    #[tokio::test]
    async fn execute_skips_closure_while_open() {
        let clock = ManualClock::starting_at(0);
        let b = breaker(&clock);
        fail_n(&b, 3);

        let mut invoked = false;
        let result: Result<(), BreakerError<&str>> = b
            .execute(|| {
                invoked = true;
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open(_))));
        assert!(!invoked, "wrapped function must not run while Open");
    }

    #[test]
    fn half_open_after_reset_timeout_then_success_closes() {
        let clock = ManualClock::starting_at(1_000);
        let b = breaker(&clock);
        fail_n(&b, 3);

        clock.advance(10_000);
        b.begin_call().unwrap();
        assert_eq!(b.snapshot().state, BreakerState::HalfOpen);

        b.record_success();
        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
        assert_eq!(snap.next_retry_at_millis, None);
    }

    #[test]
    fn half_open_failure_reopens_and_reschedules() {
        let clock = ManualClock::starting_at(0);
        let b = breaker(&clock);
        fail_n(&b, 3);

        clock.advance(10_000);
        b.begin_call().unwrap();
        clock.advance(500);
        b.record_failure();

        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.next_retry_at_millis, Some(20_500));
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let clock = ManualClock::starting_at(0);
        let b = breaker(&clock);
        fail_n(&b, 3);

        clock.advance(10_000);
        b.begin_call().unwrap();

        // Probe outstanding: a second caller is rejected fast.
        assert!(b.begin_call().is_err());

        b.record_success();
        assert!(b.begin_call().is_ok());
    }

    #[test]
    fn reopening_before_reset_time_keeps_rejecting() {
        let clock = ManualClock::starting_at(0);
        let b = breaker(&clock);
        fail_n(&b, 3);

        clock.advance(9_999);
        assert!(b.begin_call().is_err());

        clock.advance(1);
        assert!(b.begin_call().is_ok());
    }

    #[test]
    fn manual_overrides() {
        let clock = ManualClock::starting_at(0);
        let b = breaker(&clock);

        b.force_open();
        assert_eq!(b.snapshot().state, BreakerState::Open);
        assert!(b.begin_call().is_err());

        b.force_half_open();
        assert_eq!(b.snapshot().state, BreakerState::HalfOpen);
        assert!(b.begin_call().is_ok());

        b.force_close();
        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
    }

    #[test]
    fn failures_ignored_while_open() {
        let clock = ManualClock::starting_at(0);
        let b = breaker(&clock);
        fail_n(&b, 3);

        let before = b.snapshot();
        b.record_failure();
        let after = b.snapshot();

        assert_eq!(before.next_retry_at_millis, after.next_retry_at_millis);
        assert_eq!(after.state, BreakerState::Open);
    }

    #[test]
    fn transition_count_tracks_every_change() {
        let clock = ManualClock::starting_at(0);
        let b = breaker(&clock);

        fail_n(&b, 3); // Closed -> Open
        clock.advance(10_000);
        b.begin_call().unwrap(); // Open -> HalfOpen
        b.record_success(); // HalfOpen -> Closed

        assert_eq!(b.snapshot().state_transitions, 3);
    }
}
