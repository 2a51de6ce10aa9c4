//! Split Request State Machine
//!
//! A client command becomes either a single-shard request (forwarded
//! verbatim to the shard owning its key) or a fragmented request (one
//! sub-command per key, combined by an [`Aggregation`] policy).
//!
//! ```text
//!                    all children resolved
//!   Active ──────────────────────────────────> Completed   (reply sent once)
//!     │
//!     └──── cancel() / handle dropped ───────> Cancelled   (no reply)
//! ```
//!
//! ## Ownership
//!
//! The returned [`SplitRequest`] owns the request state. Children only
//! hold a `Weak` pointer plus their slot index, so a completion arriving
//! after the handle is gone finds nothing to upgrade and is dropped.
//!
//! ## Locking
//!
//! State sits behind a `Mutex` that is never held while calling into the
//! pool or into the caller's callbacks. A pool may therefore complete a
//! child from inside `make_request`, and a caller may cancel from inside
//! its own reply callback. The status flag is checked and flipped under
//! the lock, which is what makes the reply fire at most once.

use super::aggregate::{Aggregation, Aggregator, ChildOutcome};
use crate::error::SplitError;
use crate::pool::{ConnPool, PoolCallbacks, PoolRequest};
use crate::protocol::RespValue;
use crate::stats::{CommandStats, TimeSource, Timespan};
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, trace, warn};

/// Receives the single terminal reply for a client command.
///
/// Implemented for any `FnOnce(RespValue) + Send` closure.
pub trait SplitCallbacks: Send {
    fn on_response(self: Box<Self>, value: RespValue);
}

impl<F> SplitCallbacks for F
where
    F: FnOnce(RespValue) + Send,
{
    fn on_response(self: Box<Self>, value: RespValue) {
        (*self)(value)
    }
}

/// Lifecycle state of a split request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Active,
    Completed,
    Cancelled,
}

/// One sub-command of a fragmented request.
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    pub hash_key: Bytes,
    pub request: RespValue,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by both request shapes.
struct RequestBase {
    status: RequestStatus,
    callbacks: Option<Box<dyn SplitCallbacks>>,
    stats: Arc<CommandStats>,
    latency: Option<Timespan>,
}

impl RequestBase {
    fn new(
        callbacks: Box<dyn SplitCallbacks>,
        stats: Arc<CommandStats>,
        time_source: &Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            status: RequestStatus::Active,
            callbacks: Some(callbacks),
            stats,
            latency: Some(Timespan::start(time_source)),
        }
    }

    fn is_active(&self) -> bool {
        self.status == RequestStatus::Active
    }

    /// Moves to `Completed`, updates stats, and hands back the callbacks
    /// to invoke once the lock is released.
    fn complete(&mut self, success: bool) -> Option<Box<dyn SplitCallbacks>> {
        if !self.is_active() {
            return None;
        }
        self.status = RequestStatus::Completed;
        self.stats.request_completed(success);
        if let Some(span) = self.latency.take() {
            span.complete(&self.stats);
        }
        self.callbacks.take()
    }

    /// Moves to `Cancelled`. The abandoned callbacks are returned so they
    /// can be dropped outside the lock.
    fn cancel(&mut self) -> Option<Box<dyn SplitCallbacks>> {
        if !self.is_active() {
            return None;
        }
        self.status = RequestStatus::Cancelled;
        self.latency = None;
        self.callbacks.take()
    }
}

/// Handle to an in-flight client command.
///
/// The caller keeps it only to be able to cancel, but it must be kept for
/// as long as the reply is wanted: dropping an active handle cancels the
/// request.
#[must_use = "dropping the handle cancels the request"]
pub struct SplitRequest {
    kind: RequestKind,
}

enum RequestKind {
    Single(Arc<Mutex<SingleState>>),
    Fragmented(Arc<Mutex<FragmentedState>>),
}

impl SplitRequest {
    /// Cancels outstanding sub-commands. The reply callback will not be
    /// invoked after this returns. Calling it again is a no-op.
    pub fn cancel(&self) {
        match &self.kind {
            RequestKind::Single(state) => cancel_single(state),
            RequestKind::Fragmented(state) => cancel_fragmented(state),
        }
    }

    pub fn status(&self) -> RequestStatus {
        match &self.kind {
            RequestKind::Single(state) => lock(state).base.status,
            RequestKind::Fragmented(state) => lock(state).base.status,
        }
    }

    /// Number of sub-commands still waiting for a reply.
    pub fn pending(&self) -> usize {
        match &self.kind {
            RequestKind::Single(state) => usize::from(lock(state).handle.is_some()),
            RequestKind::Fragmented(state) => lock(state).num_pending,
        }
    }
}

impl Drop for SplitRequest {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SplitRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self.kind {
            RequestKind::Single(_) => "single",
            RequestKind::Fragmented(_) => "fragmented",
        };
        f.debug_struct("SplitRequest")
            .field("shape", &shape)
            .field("status", &self.status())
            .finish()
    }
}

// ============================================================================
// Single-shard requests
// ============================================================================

struct SingleState {
    base: RequestBase,
    handle: Option<Box<dyn PoolRequest>>,
}

struct SingleChild {
    parent: Weak<Mutex<SingleState>>,
}

impl PoolCallbacks for SingleChild {
    fn on_response(self: Box<Self>, value: RespValue) {
        finish_single(&self.parent, Ok(value));
    }

    fn on_failure(self: Box<Self>) {
        finish_single(&self.parent, Err(SplitError::UpstreamFailure));
    }
}

fn finish_single(parent: &Weak<Mutex<SingleState>>, outcome: Result<RespValue, SplitError>) {
    let Some(state) = parent.upgrade() else {
        trace!("Reply for a dropped request ignored");
        return;
    };

    let callbacks = {
        let mut state = lock(&state);
        state.handle = None;
        state.base.complete(outcome.is_ok())
    };

    if let Some(callbacks) = callbacks {
        callbacks.on_response(outcome.unwrap_or_else(RespValue::from));
    }
}

fn cancel_single(state: &Arc<Mutex<SingleState>>) {
    let (handle, abandoned) = {
        let mut state = lock(state);
        let abandoned = state.base.cancel();
        (state.handle.take(), abandoned)
    };
    if let Some(handle) = handle {
        debug!("Cancelling single-shard request");
        handle.cancel();
    }
    drop(abandoned);
}

/// Forwards `request` unchanged to the shard owning `hash_key`.
///
/// Returns `None` when the request finished before this function
/// returned, either because no shard owns the key or because the pool
/// replied synchronously.
pub(crate) fn start_single(
    pool: &dyn ConnPool,
    hash_key: Bytes,
    request: RespValue,
    callbacks: Box<dyn SplitCallbacks>,
    stats: Arc<CommandStats>,
    time_source: &Arc<dyn TimeSource>,
) -> Option<SplitRequest> {
    let state = Arc::new(Mutex::new(SingleState {
        base: RequestBase::new(callbacks, stats, time_source),
        handle: None,
    }));

    let child = Box::new(SingleChild {
        parent: Arc::downgrade(&state),
    });

    match pool.make_request(&hash_key, request, child) {
        Some(handle) => {
            let mut guard = lock(&state);
            if !guard.base.is_active() {
                return None;
            }
            guard.handle = Some(handle);
        }
        None => {
            warn!(key = %String::from_utf8_lossy(&hash_key), "No upstream host for key");
            let callbacks = lock(&state).base.complete(false);
            if let Some(callbacks) = callbacks {
                callbacks.on_response(SplitError::NoUpstreamHost.to_reply());
            }
            return None;
        }
    }

    Some(SplitRequest {
        kind: RequestKind::Single(state),
    })
}

// ============================================================================
// Fragmented requests
// ============================================================================

/// Per-child bookkeeping, indexed by the child's position.
enum ChildSlot {
    /// Waiting for a reply. The handle is `None` until `make_request`
    /// returns it.
    Pending(Option<Box<dyn PoolRequest>>),
    Resolved,
}

struct FragmentedState {
    base: RequestBase,
    aggregator: Aggregator,
    children: Vec<ChildSlot>,
    num_pending: usize,
    error_count: usize,
}

impl FragmentedState {
    /// Applies one child outcome. Returns the callbacks and the final
    /// reply when this outcome resolved the last pending child.
    fn resolve(
        &mut self,
        index: usize,
        outcome: ChildOutcome,
    ) -> Option<(Box<dyn SplitCallbacks>, RespValue)> {
        if !self.base.is_active() {
            return None;
        }
        match self.children.get_mut(index) {
            Some(slot @ ChildSlot::Pending(_)) => *slot = ChildSlot::Resolved,
            _ => return None,
        }

        trace!(index, outcome = ?outcome, "Fragment resolved");
        if self.aggregator.absorb(index, outcome) {
            self.error_count += 1;
        }
        self.num_pending -= 1;
        if self.num_pending > 0 {
            return None;
        }

        let reply = self.aggregator.finish();
        debug!(
            command = self.base.stats.name(),
            fragments = self.children.len(),
            errors = self.error_count,
            "Fragmented request complete"
        );
        let callbacks = self.base.complete(self.error_count == 0)?;
        Some((callbacks, reply))
    }
}

struct FragmentChild {
    parent: Weak<Mutex<FragmentedState>>,
    index: usize,
}

impl PoolCallbacks for FragmentChild {
    fn on_response(self: Box<Self>, value: RespValue) {
        on_child_outcome(&self.parent, self.index, ChildOutcome::Reply(value));
    }

    fn on_failure(self: Box<Self>) {
        on_child_outcome(
            &self.parent,
            self.index,
            ChildOutcome::Failed(SplitError::UpstreamFailure),
        );
    }
}

fn on_child_outcome(parent: &Weak<Mutex<FragmentedState>>, index: usize, outcome: ChildOutcome) {
    let Some(state) = parent.upgrade() else {
        trace!(index, "Fragment reply for a dropped request ignored");
        return;
    };

    let done = lock(&state).resolve(index, outcome);
    if let Some((callbacks, reply)) = done {
        callbacks.on_response(reply);
    }
}

fn cancel_fragmented(state: &Arc<Mutex<FragmentedState>>) {
    let (handles, abandoned) = {
        let mut state = lock(state);
        let abandoned = state.base.cancel();
        if abandoned.is_none() {
            return;
        }
        let handles: Vec<Box<dyn PoolRequest>> = state
            .children
            .iter_mut()
            .filter_map(|slot| match slot {
                ChildSlot::Pending(handle) => handle.take(),
                ChildSlot::Resolved => None,
            })
            .collect();
        (handles, abandoned)
    };

    debug!(outstanding = handles.len(), "Cancelling fragmented request");
    for handle in handles {
        handle.cancel();
    }
    drop(abandoned);
}

/// Dispatches every fragment immediately and combines the replies with
/// `aggregation`.
///
/// Returns `None` when every fragment resolved before this function
/// returned; the reply has then already been delivered.
pub(crate) fn start_fragmented(
    pool: &dyn ConnPool,
    aggregation: Aggregation,
    fragments: Vec<Fragment>,
    callbacks: Box<dyn SplitCallbacks>,
    stats: Arc<CommandStats>,
    time_source: &Arc<dyn TimeSource>,
) -> Option<SplitRequest> {
    let count = fragments.len();
    let state = Arc::new(Mutex::new(FragmentedState {
        base: RequestBase::new(callbacks, stats, time_source),
        aggregator: Aggregator::new(aggregation, count),
        children: (0..count).map(|_| ChildSlot::Pending(None)).collect(),
        num_pending: count,
        error_count: 0,
    }));

    if count == 0 {
        let done = {
            let mut guard = lock(&state);
            let reply = guard.aggregator.finish();
            guard.base.complete(true).map(|cb| (cb, reply))
        };
        if let Some((callbacks, reply)) = done {
            callbacks.on_response(reply);
        }
        return None;
    }

    let parent = Arc::downgrade(&state);
    for (index, fragment) in fragments.into_iter().enumerate() {
        let child = Box::new(FragmentChild {
            parent: Weak::clone(&parent),
            index,
        });

        match pool.make_request(&fragment.hash_key, fragment.request, child) {
            Some(handle) => {
                let mut guard = lock(&state);
                // A synchronous reply already resolved the slot; the
                // handle is dropped with nothing left to cancel.
                if let Some(ChildSlot::Pending(slot)) = guard.children.get_mut(index) {
                    *slot = Some(handle);
                }
            }
            None => {
                warn!(
                    key = %String::from_utf8_lossy(&fragment.hash_key),
                    "No upstream host for key"
                );
                on_child_outcome(
                    &parent,
                    index,
                    ChildOutcome::Failed(SplitError::NoUpstreamHost),
                );
            }
        }
    }

    if !lock(&state).base.is_active() {
        return None;
    }

    Some(SplitRequest {
        kind: RequestKind::Fragmented(state),
    })
}
