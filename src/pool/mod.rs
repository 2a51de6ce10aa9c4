//! Connection Pool Capability
//!
//! The splitter does not open connections or know the shard topology.
//! It hands each sub-command to a [`ConnPool`], which resolves the hash
//! key to a shard, sends the command and later reports the outcome
//! through the [`PoolCallbacks`] it was given.
//!
//! ```text
//!   splitter ──make_request(key, cmd, callbacks)──> ConnPool
//!       ▲                                              │
//!       │         Option<Box<dyn PoolRequest>>  <──────┘
//!       │
//!       └──── callbacks.on_response(value) | callbacks.on_failure()
//! ```
//!
//! ## Contract
//!
//! - `make_request` returns `None` when no shard can serve the key; the
//!   callbacks are then dropped without being invoked.
//! - Otherwise exactly one of `on_response` / `on_failure` is delivered,
//!   unless [`PoolRequest::cancel`] is called first. Both methods consume
//!   the boxed callbacks, so a second delivery cannot be expressed.
//! - Callbacks may be delivered synchronously from inside `make_request`.
//! - Timeouts are the pool's business; report them as `on_failure`.

#[cfg(test)]
pub(crate) mod mock;

use crate::protocol::RespValue;

/// Completion interface for one dispatched sub-command.
pub trait PoolCallbacks: Send {
    /// The shard replied. The value may itself be a RESP error.
    fn on_response(self: Box<Self>, value: RespValue);

    /// The sub-command failed before a reply was received.
    fn on_failure(self: Box<Self>);
}

/// Handle to an outstanding sub-command, used only to cancel it.
pub trait PoolRequest: Send {
    /// Best-effort: suppresses a completion that has not been delivered yet.
    fn cancel(self: Box<Self>);
}

/// Dispatches sub-commands to the shard owning a key.
pub trait ConnPool: Send + Sync {
    /// Sends `request` to the shard owning `hash_key`.
    fn make_request(
        &self,
        hash_key: &[u8],
        request: RespValue,
        callbacks: Box<dyn PoolCallbacks>,
    ) -> Option<Box<dyn PoolRequest>>;
}
