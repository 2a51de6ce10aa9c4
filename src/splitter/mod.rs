//! Command Splitting
//!
//! Turns one client command into one or more shard sub-commands and folds
//! the shard replies back into a single client reply.
//!
//! ## Request Flow
//!
//! ```text
//!   client command
//!        │
//!        ▼
//!   ┌──────────┐   lookup    ┌────────────────┐
//!   │ Splitter │───────────> │ CommandRegistry│  name → (handler, stats)
//!   └────┬─────┘             └────────────────┘
//!        │ start_request()
//!        ▼
//!   ┌──────────────────────────────────────────────┐
//!   │ CommandHandler                               │
//!   │   Simple / Eval ──> single-shard request     │
//!   │   Gather / Sum / Acknowledge                 │
//!   │                ──> fragmented request        │
//!   └────┬─────────────────────────────────────────┘
//!        │ make_request(hash_key, sub-command)
//!        ▼
//!   ┌──────────┐   on_response / on_failure
//!   │ ConnPool │ ─────────────────────────────> Aggregator ──> SplitCallbacks
//!   └──────────┘
//! ```
//!
//! Every started request ends in exactly one of two ways: one reply to the
//! caller's [`SplitCallbacks`], or cancellation through its
//! [`SplitRequest`] handle with no reply at all.

pub mod aggregate;
pub mod handler;
pub mod instance;
pub mod registry;
pub mod reply;
pub mod request;

pub use aggregate::Aggregation;
pub use handler::CommandHandler;
pub use instance::Splitter;
pub use registry::{CommandRegistry, HandlerEntry, ToLowerTable, TrieLookupTable, TO_LOWER};
pub use reply::PendingReply;
pub use request::{RequestStatus, SplitCallbacks, SplitRequest};
