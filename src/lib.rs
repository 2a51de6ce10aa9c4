//! # FlashSplit - A Command Splitter for Sharded Redis Backends
//!
//! FlashSplit sits between a RESP front-end and a pool of Redis-compatible
//! shards. It takes a decoded client command, routes it to the shard that
//! owns its key, and for multi-key commands fans out one sub-command per
//! key and combines the replies.
//!
//! ## Features
//!
//! - **Single-shard forwarding**: `GET`, `SET`, `HGET`, `EVAL` and friends
//!   go to the shard owning their key, unchanged
//! - **Fan-out / fan-in**: `MGET`, `MSET`, `DEL`, `EXISTS`, `TOUCH` and
//!   `UNLINK` are split per key and aggregated
//! - **Cancellation**: dropping a request handle cancels every outstanding
//!   sub-command, and no reply is delivered afterwards
//! - **Statistics**: per-command counters and latency histograms, mirrored
//!   to the `metrics` facade
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             FlashSplit                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │  Splitter   │───>│  Command    │───>│  Command    │                  │
//! │  │  (façade)   │    │  Registry   │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │   Stats     │<───│               SplitRequest                   │    │
//! │  │  (metrics)  │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │  └─────────────┘    │  │child 0 │ │child 1 │ │child 2 │ │...N    │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────┬───────────────────────┘    │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                     ┌─────────────────────────────────────────────────┐ │
//! │                     │        ConnPool (provided by the caller)        │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use flashsplit::{RespValue, Splitter};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let splitter = Splitter::new(Arc::new(MyShardPool::connect().await));
//!
//!     let reply = splitter
//!         .make_request_async(RespValue::command(["MGET", "a", "b", "c"]))
//!         .await;
//!     println!("{}", reply);
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP value model
//! - [`pool`]: the connection pool interface the splitter dispatches to
//! - [`splitter`]: registry, handlers, request state machine and façade
//! - [`stats`]: per-command counters and latency histograms
//! - [`config`]: stat prefix and histogram buckets
//! - [`error`]: error replies sent to the client

pub mod config;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod splitter;
pub mod stats;

// Re-export commonly used types for convenience
pub use config::SplitterConfig;
pub use error::SplitError;
pub use pool::{ConnPool, PoolCallbacks, PoolRequest};
pub use protocol::RespValue;
pub use splitter::{
    Aggregation, CommandHandler, CommandRegistry, PendingReply, RequestStatus, SplitCallbacks,
    SplitRequest, Splitter,
};
pub use stats::{
    CommandStats, CommandStatsSnapshot, MonotonicClock, SplitterStats, SplitterStatsSnapshot,
    TimeSource,
};

/// Version of FlashSplit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
