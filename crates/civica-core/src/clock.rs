//! Clock abstraction for deterministic testing.
//!
//! Decouples the breaker and limiter from system time. Production code
//! uses [`SystemClock`]; tests drive [`ManualClock`] forward explicitly,
//! so window rollover and breaker reset timers are exercised without
//! sleeping.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Wall-clock time source, in milliseconds since the Unix epoch.
///
/// # Invariants
///
/// Implementations must never go backwards within a single execution
/// context; subsequent calls return values >= previous calls.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Production clock backed by `SystemTime`.
#[derive(Clone, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_millis() as u64
    }
}

/// Test clock advanced explicitly by the caller.
///
/// Clones share the same underlying time, so a clock handed to a breaker
/// can be advanced from the test body.
#[derive(Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at the given epoch offset.
    #[must_use]
    pub fn starting_at(millis: u64) -> Self {
        Self { millis: Arc::new(AtomicU64::new(millis)) }
    }

    /// Advance the clock by `millis` milliseconds.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock::new();
        let t1 = clock.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let t2 = clock.now_millis();
        assert!(t2 >= t1);
    }

    #[test]
    fn manual_clock_is_shared_across_clones() {
        let clock = ManualClock::starting_at(1_000);
        let clone = clock.clone();

        clock.advance(500);
        assert_eq!(clone.now_millis(), 1_500);

        clone.set(10_000);
        assert_eq!(clock.now_millis(), 10_000);
    }
}
