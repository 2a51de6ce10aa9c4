//! Future-based access to split replies.

use super::request::SplitRequest;
use crate::error::SplitError;
use crate::protocol::RespValue;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves to the reply of one split command.
///
/// Created by [`Splitter::make_request_async`](crate::Splitter::make_request_async).
/// Dropping it before it resolves cancels the request.
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<RespValue>,
    request: Option<SplitRequest>,
}

impl PendingReply {
    pub(crate) fn new(rx: oneshot::Receiver<RespValue>, request: Option<SplitRequest>) -> Self {
        Self { rx, request }
    }

    /// The underlying request, if it was still in flight when created.
    pub fn request(&self) -> Option<&SplitRequest> {
        self.request.as_ref()
    }
}

impl Future for PendingReply {
    type Output = RespValue;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            // sender dropped without a reply
            Poll::Ready(Err(_)) => Poll::Ready(SplitError::UpstreamFailure.to_reply()),
            Poll::Pending => Poll::Pending,
        }
    }
}
