//! In-memory counter store for tests and single-process deployments.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use super::store::{RateLimitRecord, RateLimitStore, RateLimitStoreError, WindowSlot};

/// In-memory window counters.
///
/// Clones share the same map via `Arc<Mutex<..>>`, so a store handed to
/// two limiters behaves like one shared backend. Per-process only: a
/// horizontally scaled deployment needs a genuinely shared store for
/// exact limiting.
#[derive(Clone, Default)]
pub struct MemoryRateLimitStore {
    inner: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
}

impl MemoryRateLimitStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records, for tests.
    pub fn record_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RateLimitRecord>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn try_increment(
        &self,
        key: &str,
        window_start_millis: u64,
        ceiling: u32,
        expires_at_millis: u64,
    ) -> Result<WindowSlot, RateLimitStoreError> {
        let mut records = self.lock();

        let fresh = RateLimitRecord { window_start_millis, count: 1, expires_at_millis };

        match records.get_mut(key) {
            // Stale window (or a record past its expiry): reset to 1.
            Some(record)
                if record.window_start_millis != window_start_millis
                    || record.expires_at_millis <= window_start_millis =>
            {
                *record = fresh;
                Ok(WindowSlot { count: 1, allowed: true })
            },
            Some(record) if record.count < ceiling => {
                record.count += 1;
                Ok(WindowSlot { count: record.count, allowed: true })
            },
            Some(record) => Ok(WindowSlot { count: record.count, allowed: false }),
            None => {
                records.insert(key.to_string(), fresh);
                Ok(WindowSlot { count: 1, allowed: true })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_creates_record_at_one() {
        let store = MemoryRateLimitStore::new();
        let slot = store.try_increment("k", 0, 5, 120_000).unwrap();
        assert_eq!(slot, WindowSlot { count: 1, allowed: true });
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn increments_until_ceiling_then_denies_without_change() {
        let store = MemoryRateLimitStore::new();
        for expected in 1..=3 {
            let slot = store.try_increment("k", 0, 3, 120_000).unwrap();
            assert_eq!(slot, WindowSlot { count: expected, allowed: true });
        }

        let denied = store.try_increment("k", 0, 3, 120_000).unwrap();
        assert_eq!(denied, WindowSlot { count: 3, allowed: false });

        let still_denied = store.try_increment("k", 0, 3, 120_000).unwrap();
        assert_eq!(still_denied.count, 3, "denied requests must not change the count");
    }

    #[test]
    fn stale_window_resets_to_one() {
        let store = MemoryRateLimitStore::new();
        store.try_increment("k", 0, 1, 120_000).unwrap();

        let slot = store.try_increment("k", 60_000, 1, 180_000).unwrap();
        assert_eq!(slot, WindowSlot { count: 1, allowed: true });
    }

    #[test]
    fn keys_are_independent() {
        let store = MemoryRateLimitStore::new();
        store.try_increment("a", 0, 1, 120_000).unwrap();

        let slot = store.try_increment("b", 0, 1, 120_000).unwrap();
        assert!(slot.allowed);
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryRateLimitStore::new();
        let clone = store.clone();

        store.try_increment("k", 0, 2, 120_000).unwrap();
        let slot = clone.try_increment("k", 0, 2, 120_000).unwrap();
        assert_eq!(slot.count, 2);
    }
}
