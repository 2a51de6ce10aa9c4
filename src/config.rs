//! Splitter configuration.

use std::time::Duration;

/// Default prefix for every exported metric name.
pub const DEFAULT_STAT_PREFIX: &str = "redis.";

/// Latency histogram bounds tuned for proxied cache traffic (10µs to 100ms).
const DEFAULT_LATENCY_BUCKETS_US: &[u64] = &[
    10,      // 10µs
    25,      // 25µs
    50,      // 50µs
    100,     // 100µs
    250,     // 250µs
    500,     // 500µs
    1_000,   // 1ms
    2_500,   // 2.5ms
    5_000,   // 5ms
    10_000,  // 10ms
    25_000,  // 25ms
    50_000,  // 50ms
    100_000, // 100ms
];

/// Configuration for a [`Splitter`](crate::Splitter).
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Prefix prepended to all metric names, e.g. `redis.` gives
    /// `redis.command.get.total`.
    pub stat_prefix: String,

    /// Upper bounds of the per-command latency histogram buckets.
    /// Samples above the last bound land in an overflow bucket.
    pub latency_buckets: Vec<Duration>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            stat_prefix: DEFAULT_STAT_PREFIX.to_string(),
            latency_buckets: DEFAULT_LATENCY_BUCKETS_US
                .iter()
                .map(|us| Duration::from_micros(*us))
                .collect(),
        }
    }
}

impl SplitterConfig {
    /// Returns a config using the given metric prefix and default buckets.
    pub fn with_stat_prefix(prefix: impl Into<String>) -> Self {
        Self {
            stat_prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Bucket bounds sorted ascending with duplicates removed.
    pub(crate) fn normalized_buckets(&self) -> Vec<Duration> {
        let mut buckets = self.latency_buckets.clone();
        buckets.sort();
        buckets.dedup();
        buckets
    }
}
