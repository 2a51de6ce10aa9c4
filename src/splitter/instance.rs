//! Splitter Façade
//!
//! Entry point used by a protocol front-end. It checks the top-level
//! command shape, finds the handler for the command name and starts the
//! request.
//!
//! ```text
//!   RespValue ──> shape check ──> registry lookup ──> handler.start_request()
//!                    │                  │                     │
//!                    ▼                  ▼                     ▼
//!             invalid request   unsupported command   Option<SplitRequest>
//! ```

use super::registry::CommandRegistry;
use super::reply::PendingReply;
use super::request::{SplitCallbacks, SplitRequest};
use crate::config::SplitterConfig;
use crate::error::SplitError;
use crate::pool::ConnPool;
use crate::protocol::RespValue;
use crate::stats::{
    CommandStatsSnapshot, MonotonicClock, SplitterStats, SplitterStatsSnapshot, TimeSource,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Splits client commands into shard sub-commands.
///
/// # Example
///
/// ```ignore
/// use flashsplit::{RespValue, Splitter};
/// use std::sync::Arc;
///
/// let splitter = Splitter::new(Arc::new(my_pool));
/// let handle = splitter.make_request(
///     RespValue::command(["MGET", "a", "b"]),
///     |reply: RespValue| println!("{}", reply),
/// );
/// // keep `handle` alive until the reply arrives, or drop it to cancel
/// ```
#[derive(Clone)]
pub struct Splitter {
    pool: Arc<dyn ConnPool>,
    registry: Arc<CommandRegistry>,
    stats: Arc<SplitterStats>,
    time_source: Arc<dyn TimeSource>,
}

impl Splitter {
    /// Creates a splitter with the default configuration.
    pub fn new(pool: Arc<dyn ConnPool>) -> Self {
        Self::with_config(pool, SplitterConfig::default())
    }

    pub fn with_config(pool: Arc<dyn ConnPool>, config: SplitterConfig) -> Self {
        let stats = Arc::new(SplitterStats::new(&config));
        let registry = Arc::new(CommandRegistry::with_supported_commands(config));
        Self::with_registry(pool, registry, stats)
    }

    /// Creates a splitter sharing an existing registry and stats scope,
    /// e.g. one splitter per event loop over the same backend.
    pub fn with_registry(
        pool: Arc<dyn ConnPool>,
        registry: Arc<CommandRegistry>,
        stats: Arc<SplitterStats>,
    ) -> Self {
        Self {
            pool,
            registry,
            stats,
            time_source: Arc::new(MonotonicClock),
        }
    }

    /// Replaces the clock used to time requests.
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Starts splitting `request`.
    ///
    /// `callbacks` receives exactly one reply unless the returned handle is
    /// cancelled or dropped first. `None` means the reply has already been
    /// delivered (validation errors, missing hosts, synchronous pools).
    ///
    /// Hold on to the returned handle until the reply arrives. Dropping it
    /// cancels the request.
    #[must_use = "dropping the handle cancels the request"]
    pub fn make_request(
        &self,
        request: RespValue,
        callbacks: impl SplitCallbacks + 'static,
    ) -> Option<SplitRequest> {
        self.make_request_boxed(request, Box::new(callbacks))
    }

    /// Like [`make_request`](Self::make_request), with already boxed callbacks.
    #[must_use = "dropping the handle cancels the request"]
    pub fn make_request_boxed(
        &self,
        request: RespValue,
        callbacks: Box<dyn SplitCallbacks>,
    ) -> Option<SplitRequest> {
        let args = match command_args(&request) {
            Some(args) => args,
            None => {
                debug!(request = %request, "Invalid request");
                self.stats.invalid_request();
                callbacks.on_response(SplitError::InvalidRequest.to_reply());
                return None;
            }
        };

        let entry = match self.registry.lookup(&args[0]) {
            Some(entry) => entry,
            None => {
                let name = String::from_utf8_lossy(&args[0]).into_owned();
                debug!(command = %name, "Unsupported command");
                self.stats.unsupported_command();
                callbacks.on_response(SplitError::UnsupportedCommand(name).to_reply());
                return None;
            }
        };

        debug!(request = %request, "Splitting request");
        entry.stats.request_started();
        entry.handler.start_request(
            self.pool.as_ref(),
            request,
            args,
            callbacks,
            &entry.stats,
            &self.time_source,
        )
    }

    /// Starts splitting `request` and returns a future for its reply.
    pub fn make_request_async(&self, request: RespValue) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        let handle = self.make_request(request, move |reply: RespValue| {
            let _ = tx.send(reply);
        });
        PendingReply::new(rx, handle)
    }

    /// Splitter-wide counters.
    pub fn stats(&self) -> SplitterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Counters for one command (case-insensitive), if it is supported.
    pub fn command_stats(&self, name: &str) -> Option<CommandStatsSnapshot> {
        self.registry
            .lookup(name.as_bytes())
            .map(|entry| entry.stats.snapshot())
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for Splitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Splitter")
            .field("registry", &self.registry)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Returns the elements of a well-formed command: a non-empty array of
/// bulk strings with a non-empty name.
fn command_args(request: &RespValue) -> Option<Vec<Bytes>> {
    let elements = request.as_array()?;
    let args = elements
        .iter()
        .map(|e| match e {
            RespValue::BulkString(b) => Some(b.clone()),
            _ => None,
        })
        .collect::<Option<Vec<Bytes>>>()?;

    match args.first() {
        Some(name) if !name.is_empty() => Some(args),
        _ => None,
    }
}
