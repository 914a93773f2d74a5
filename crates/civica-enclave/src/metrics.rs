//! Process metrics for the decryption service.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram bucket upper bounds for request duration, in milliseconds.
const DURATION_BUCKETS_MILLIS: [u64; 8] = [10, 50, 100, 250, 500, 1_000, 2_500, 5_000];

/// Counters and gauges exposed at `GET /metrics`.
///
/// Plain atomics; the service observes them on the request path without
/// locking.
pub struct EnclaveMetrics {
    decryptions: AtomicU64,
    decryption_errors: AtomicU64,
    forwards: AtomicU64,
    queue_depth: AtomicU64,
    duration_buckets: [AtomicU64; DURATION_BUCKETS_MILLIS.len()],
    duration_sum_millis: AtomicU64,
    duration_count: AtomicU64,
}

impl EnclaveMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self {
            decryptions: AtomicU64::new(0),
            decryption_errors: AtomicU64::new(0),
            forwards: AtomicU64::new(0),
            queue_depth: AtomicU64::new(0),
            duration_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            duration_sum_millis: AtomicU64::new(0),
            duration_count: AtomicU64::new(0),
        }
    }

    /// Record a successful decryption.
    pub fn record_decryption(&self) {
        self.decryptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed decryption.
    pub fn record_decryption_error(&self) {
        self.decryption_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a confirmed upstream forward.
    pub fn record_forward(&self) {
        self.forwards.fetch_add(1, Ordering::Relaxed);
    }

    /// Observe one request's end-to-end duration.
    pub fn observe_duration(&self, millis: u64) {
        for (bound, bucket) in DURATION_BUCKETS_MILLIS.iter().zip(&self.duration_buckets) {
            if millis <= *bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.duration_sum_millis.fetch_add(millis, Ordering::Relaxed);
        self.duration_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a decrypt request as in flight.
    ///
    /// The queue-depth gauge counts requests between this call and the
    /// drop of the returned guard, so `/health` reports how much work
    /// the enclave currently holds.
    pub fn track_request(self: &Arc<Self>) -> InFlightRequest {
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
        InFlightRequest { metrics: Arc::clone(self) }
    }

    /// Current queue-depth gauge.
    pub fn queue_depth(&self) -> u64 {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Render the Prometheus text exposition format.
    pub fn render(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::with_capacity(1024);
        let counters = [
            ("civica_decryptions_total", self.decryptions.load(Ordering::Relaxed)),
            ("civica_decryption_errors_total", self.decryption_errors.load(Ordering::Relaxed)),
            ("civica_forwards_total", self.forwards.load(Ordering::Relaxed)),
        ];
        for (name, value) in counters {
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }

        let _ = writeln!(out, "# TYPE civica_queue_depth gauge");
        let _ = writeln!(out, "civica_queue_depth {}", self.queue_depth());

        let _ = writeln!(out, "# TYPE civica_request_duration_millis histogram");
        for (bound, bucket) in DURATION_BUCKETS_MILLIS.iter().zip(&self.duration_buckets) {
            let _ = writeln!(
                out,
                "civica_request_duration_millis_bucket{{le=\"{bound}\"}} {}",
                bucket.load(Ordering::Relaxed)
            );
        }
        let count = self.duration_count.load(Ordering::Relaxed);
        let _ = writeln!(out, "civica_request_duration_millis_bucket{{le=\"+Inf\"}} {count}");
        let _ = writeln!(
            out,
            "civica_request_duration_millis_sum {}",
            self.duration_sum_millis.load(Ordering::Relaxed)
        );
        let _ = writeln!(out, "civica_request_duration_millis_count {count}");
        out
    }
}

impl Default for EnclaveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`EnclaveMetrics::track_request`].
///
/// Decrements the queue-depth gauge on drop, including when the request
/// future is cancelled by a dropped connection.
pub struct InFlightRequest {
    metrics: Arc<EnclaveMetrics>,
}

impl Drop for InFlightRequest {
    fn drop(&mut self) {
        self.metrics.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }
}
