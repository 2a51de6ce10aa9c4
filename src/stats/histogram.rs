//! Bucketed latency histogram.
//!
//! Buckets are fixed at construction and updated with relaxed atomics, so
//! recording never takes a lock. Every sample is also forwarded to the
//! `metrics` facade, where an installed exporter can aggregate it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Latency histogram with fixed upper bounds plus an overflow bucket.
pub struct LatencyHistogram {
    /// Sorted, deduplicated upper bounds.
    bounds: Vec<Duration>,
    /// One counter per bound, plus the overflow bucket at the end.
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_us: AtomicU64,
    exported: metrics::Histogram,
}

/// Point-in-time copy of a [`LatencyHistogram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramSnapshot {
    /// Upper bounds, one per entry of `buckets` except the last.
    pub bounds: Vec<Duration>,
    /// Non-cumulative sample counts. The last entry counts samples above
    /// every bound.
    pub buckets: Vec<u64>,
    /// Number of recorded samples
    pub count: u64,
    /// Sum of all samples
    pub sum: Duration,
}

impl LatencyHistogram {
    pub(crate) fn new(bounds: Vec<Duration>, metric_name: String) -> Self {
        let buckets = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            buckets,
            count: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
            exported: metrics::histogram!(metric_name),
        }
    }

    /// Records one sample.
    pub fn record(&self, elapsed: Duration) {
        let idx = self.bounds.partition_point(|bound| *bound < elapsed);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.sum_us.fetch_add(micros, Ordering::Relaxed);
        self.exported.record(elapsed.as_secs_f64() * 1000.0);
    }

    /// Number of samples recorded so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            bounds: self.bounds.clone(),
            buckets: self
                .buckets
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect(),
            count: self.count(),
            sum: Duration::from_micros(self.sum_us.load(Ordering::Relaxed)),
        }
    }
}

impl std::fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("bounds", &self.bounds)
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram() -> LatencyHistogram {
        LatencyHistogram::new(
            vec![Duration::from_millis(1), Duration::from_millis(10)],
            "test.latency".to_string(),
        )
    }

    #[test]
    fn test_bucket_selection() {
        let h = histogram();
        h.record(Duration::from_micros(500));
        h.record(Duration::from_millis(1));
        h.record(Duration::from_millis(3));
        h.record(Duration::from_secs(1));

        let snap = h.snapshot();
        assert_eq!(snap.buckets, vec![2, 1, 1]);
        assert_eq!(snap.count, 4);
    }

    #[test]
    fn test_sum() {
        let h = histogram();
        h.record(Duration::from_millis(2));
        h.record(Duration::from_millis(3));
        assert_eq!(h.snapshot().sum, Duration::from_millis(5));
    }

    #[test]
    fn test_empty_bounds_use_overflow_bucket() {
        let h = LatencyHistogram::new(Vec::new(), "test.latency".to_string());
        h.record(Duration::from_millis(1));
        assert_eq!(h.snapshot().buckets, vec![1]);
    }
}
