//! Caller-disconnect detection for streamed responses.

use crate::core::StreamCancelHandle;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Response body stream that signals its [`StreamCancelHandle`] when the
/// server drops it. Hyper drops the body once the caller goes away, so an
/// uncompleted drop means the caller disconnected mid-stream.
pub struct DisconnectStream<S> {
    inner: S,
    cancel_handle: StreamCancelHandle,
}

impl<S> DisconnectStream<S> {
    pub fn new(inner: S, cancel_handle: StreamCancelHandle) -> Self {
        Self {
            inner,
            cancel_handle,
        }
    }
}

impl<S> Stream for DisconnectStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S> Drop for DisconnectStream<S> {
    fn drop(&mut self) {
        if !self.cancel_handle.is_completed() {
            tracing::info!("Caller disconnected before stream completed");
        }
        self.cancel_handle.cancel();
    }
}
