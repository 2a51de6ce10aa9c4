//! Recording pool used by the splitter tests.
//!
//! Every dispatched sub-command is captured together with its callbacks so
//! a test can deliver replies and failures in any order. Delivery ignores
//! cancellation on purpose: it models a completion already in flight when
//! the request was cancelled.

use super::{ConnPool, PoolCallbacks, PoolRequest};
use crate::protocol::RespValue;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type AutoReply = Box<dyn Fn(&[u8], &RespValue) -> Option<RespValue> + Send + Sync>;

struct Dispatched {
    hash_key: Bytes,
    request: RespValue,
    callbacks: Option<Box<dyn PoolCallbacks>>,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
pub(crate) struct MockPool {
    dispatched: Mutex<Vec<Dispatched>>,
    no_host: Mutex<HashSet<Bytes>>,
    auto_reply: Mutex<Option<Arc<AutoReply>>>,
}

struct MockHandle {
    cancelled: Arc<AtomicBool>,
}

impl PoolRequest for MockHandle {
    fn cancel(self: Box<Self>) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl MockPool {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `make_request` return `None` for this key.
    pub(crate) fn no_host_for(&self, key: &str) {
        self.no_host
            .lock()
            .unwrap()
            .insert(Bytes::copy_from_slice(key.as_bytes()));
    }

    /// Answers matching sub-commands synchronously from inside
    /// `make_request`. `None` from the closure means "deliver a failure".
    pub(crate) fn reply_immediately<F>(&self, f: F)
    where
        F: Fn(&[u8], &RespValue) -> Option<RespValue> + Send + Sync + 'static,
    {
        *self.auto_reply.lock().unwrap() = Some(Arc::new(Box::new(f)));
    }

    pub(crate) fn len(&self) -> usize {
        self.dispatched.lock().unwrap().len()
    }

    pub(crate) fn hash_key(&self, idx: usize) -> Bytes {
        self.dispatched.lock().unwrap()[idx].hash_key.clone()
    }

    pub(crate) fn request(&self, idx: usize) -> RespValue {
        self.dispatched.lock().unwrap()[idx].request.clone()
    }

    pub(crate) fn is_cancelled(&self, idx: usize) -> bool {
        self.dispatched.lock().unwrap()[idx]
            .cancelled
            .load(Ordering::SeqCst)
    }

    fn take_callbacks(&self, idx: usize) -> Box<dyn PoolCallbacks> {
        self.dispatched.lock().unwrap()[idx]
            .callbacks
            .take()
            .expect("callbacks already delivered")
    }

    pub(crate) fn respond(&self, idx: usize, value: RespValue) {
        self.take_callbacks(idx).on_response(value);
    }

    pub(crate) fn fail(&self, idx: usize) {
        self.take_callbacks(idx).on_failure();
    }
}

impl ConnPool for MockPool {
    fn make_request(
        &self,
        hash_key: &[u8],
        request: RespValue,
        callbacks: Box<dyn PoolCallbacks>,
    ) -> Option<Box<dyn PoolRequest>> {
        if self.no_host.lock().unwrap().contains(hash_key) {
            return None;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let auto_reply = self.auto_reply.lock().unwrap().clone();
        let callbacks = match auto_reply {
            Some(reply) => {
                // deliver before returning, with no pool lock held
                match reply(hash_key, &request) {
                    Some(value) => callbacks.on_response(value),
                    None => callbacks.on_failure(),
                }
                None
            }
            None => Some(callbacks),
        };

        self.dispatched.lock().unwrap().push(Dispatched {
            hash_key: Bytes::copy_from_slice(hash_key),
            request,
            callbacks,
            cancelled: Arc::clone(&cancelled),
        });

        Some(Box::new(MockHandle { cancelled }))
    }
}
