//! Splitter Statistics
//!
//! Two levels of counters are kept:
//!
//! - [`SplitterStats`]: splitter-wide counters for requests rejected before
//!   any handler was found (`invalid_request`, `unsupported_command`).
//! - [`CommandStats`]: one record per supported command name, created when
//!   the registry is built and shared by every request for that command.
//!
//! ```text
//!   make_request()
//!        │
//!        ├── malformed ─────────> SplitterStats.invalid_request
//!        ├── unknown name ──────> SplitterStats.unsupported_command
//!        └── handler found ─────> CommandStats.total
//!                                     │
//!                     Completed ──────┼──> success | error, latency
//!                     Cancelled ──────┘    (nothing)
//! ```
//!
//! Local values are plain atomics so they can be read back in tests and
//! by operators. Every increment is mirrored to the `metrics` facade.

pub mod histogram;

pub use histogram::{HistogramSnapshot, LatencyHistogram};

use crate::config::SplitterConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Splitter-wide counters.
pub struct SplitterStats {
    invalid_request: AtomicU64,
    unsupported_command: AtomicU64,
    exported_invalid: metrics::Counter,
    exported_unsupported: metrics::Counter,
}

/// Snapshot of [`SplitterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitterStatsSnapshot {
    pub invalid_request: u64,
    pub unsupported_command: u64,
}

impl SplitterStats {
    pub fn new(config: &SplitterConfig) -> Self {
        let prefix = &config.stat_prefix;
        Self {
            invalid_request: AtomicU64::new(0),
            unsupported_command: AtomicU64::new(0),
            exported_invalid: metrics::counter!(format!("{prefix}splitter.invalid_request")),
            exported_unsupported: metrics::counter!(format!(
                "{prefix}splitter.unsupported_command"
            )),
        }
    }

    pub fn invalid_request(&self) {
        self.invalid_request.fetch_add(1, Ordering::Relaxed);
        self.exported_invalid.increment(1);
    }

    pub fn unsupported_command(&self) {
        self.unsupported_command.fetch_add(1, Ordering::Relaxed);
        self.exported_unsupported.increment(1);
    }

    pub fn snapshot(&self) -> SplitterStatsSnapshot {
        SplitterStatsSnapshot {
            invalid_request: self.invalid_request.load(Ordering::Relaxed),
            unsupported_command: self.unsupported_command.load(Ordering::Relaxed),
        }
    }
}

/// Per-command counters and latency histogram.
pub struct CommandStats {
    name: String,
    total: AtomicU64,
    success: AtomicU64,
    error: AtomicU64,
    latency: LatencyHistogram,
    exported_total: metrics::Counter,
    exported_success: metrics::Counter,
    exported_error: metrics::Counter,
}

/// Snapshot of [`CommandStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatsSnapshot {
    pub name: String,
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub latency: HistogramSnapshot,
}

impl CommandStats {
    /// Creates the stats record for `name` (expected lowercase).
    pub fn new(name: &str, config: &SplitterConfig) -> Self {
        let base = format!("{}command.{}", config.stat_prefix, name);
        Self {
            name: name.to_string(),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            error: AtomicU64::new(0),
            latency: LatencyHistogram::new(
                config.normalized_buckets(),
                format!("{base}.latency"),
            ),
            exported_total: metrics::counter!(format!("{base}.total")),
            exported_success: metrics::counter!(format!("{base}.success")),
            exported_error: metrics::counter!(format!("{base}.error")),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counts a request that reached its handler.
    pub fn request_started(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.exported_total.increment(1);
    }

    /// Counts a completed request as a success or an error.
    pub fn request_completed(&self, success: bool) {
        if success {
            self.success.fetch_add(1, Ordering::Relaxed);
            self.exported_success.increment(1);
        } else {
            self.error.fetch_add(1, Ordering::Relaxed);
            self.exported_error.increment(1);
        }
    }

    pub fn latency(&self) -> &LatencyHistogram {
        &self.latency
    }

    pub fn snapshot(&self) -> CommandStatsSnapshot {
        CommandStatsSnapshot {
            name: self.name.clone(),
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            latency: self.latency.snapshot(),
        }
    }
}

impl std::fmt::Debug for SplitterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitterStats")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl std::fmt::Debug for CommandStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStats")
            .field("name", &self.name)
            .field("total", &self.total.load(Ordering::Relaxed))
            .field("success", &self.success.load(Ordering::Relaxed))
            .field("error", &self.error.load(Ordering::Relaxed))
            .finish()
    }
}

/// Source of monotonic time for request latency.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// [`TimeSource`] backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl TimeSource for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Measures one request from construction to completion.
///
/// A span that is dropped without [`Timespan::complete`] records nothing,
/// which is what happens to cancelled requests.
pub struct Timespan {
    start: Instant,
    time_source: Arc<dyn TimeSource>,
}

impl Timespan {
    pub fn start(time_source: &Arc<dyn TimeSource>) -> Self {
        Self {
            start: time_source.now(),
            time_source: Arc::clone(time_source),
        }
    }

    /// Records the elapsed time into the command's latency histogram.
    pub fn complete(self, stats: &CommandStats) {
        let elapsed = self.time_source.now().saturating_duration_since(self.start);
        stats.latency().record(elapsed);
    }
}

impl std::fmt::Debug for Timespan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timespan")
            .field("start", &self.start)
            .finish()
    }
}

/// Clock that only moves when a test advances it.
#[cfg(test)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            now: std::sync::Mutex::new(Instant::now()),
        })
    }

    pub(crate) fn advance(&self, by: std::time::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl TimeSource for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_command_stats_counts() {
        let stats = CommandStats::new("get", &SplitterConfig::default());
        stats.request_started();
        stats.request_started();
        stats.request_completed(true);
        stats.request_completed(false);

        let snap = stats.snapshot();
        assert_eq!(snap.name, "get");
        assert_eq!(snap.total, 2);
        assert_eq!(snap.success, 1);
        assert_eq!(snap.error, 1);
        assert_eq!(snap.latency.count, 0);
    }

    #[test]
    fn test_timespan_records_latency() {
        let stats = CommandStats::new("mget", &SplitterConfig::default());
        let clock = ManualClock::new();
        let time_source: Arc<dyn TimeSource> = clock.clone();

        let span = Timespan::start(&time_source);
        clock.advance(Duration::from_micros(400));
        span.complete(&stats);

        let latency = stats.snapshot().latency;
        assert_eq!(latency.count, 1);
        assert_eq!(latency.sum, Duration::from_micros(400));
        // 250µs < 400µs <= 500µs
        assert_eq!(latency.buckets[5], 1);

        // Dropped without completion: nothing recorded
        drop(Timespan::start(&time_source));
        assert_eq!(stats.latency().count(), 1);
    }

    #[test]
    fn test_monotonic_clock_span() {
        let stats = CommandStats::new("get", &SplitterConfig::default());
        let time_source: Arc<dyn TimeSource> = Arc::new(MonotonicClock);
        Timespan::start(&time_source).complete(&stats);
        assert_eq!(stats.latency().count(), 1);
    }

    #[test]
    fn test_splitter_stats() {
        let stats = SplitterStats::new(&SplitterConfig::default());
        stats.invalid_request();
        stats.unsupported_command();
        stats.unsupported_command();
        assert_eq!(
            stats.snapshot(),
            SplitterStatsSnapshot {
                invalid_request: 1,
                unsupported_command: 2,
            }
        );
    }
}
