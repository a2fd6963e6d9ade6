//! Server-Sent Events relay for `/api/stream`.
//!
//! Each caller stream is driven by its own spawned task: it performs the
//! upstream call, feeds every body chunk through a [`StreamRelay`] and
//! forwards the resulting events over a channel to the response body. The
//! body is wrapped in a [`DisconnectStream`], so when the caller goes away
//! the task stops reading and the upstream connection is released.

use crate::api::disconnect::DisconnectStream;
use crate::api::upstream::UpstreamClient;
use crate::core::logging::{get_request_id, REQUEST_ID};
use crate::core::metrics::get_metrics;
use crate::core::StreamCancelHandle;
use crate::services::ModelDescriptor;
use crate::transformer::stream::STREAM_FAILED_MESSAGE;
use crate::transformer::{StreamEvent, StreamRelay, UpstreamMessage};
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::StreamExt;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// Events buffered between the relay task and a slow caller.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Open an event-stream response and start relaying `messages` to upstream.
///
/// Upstream failures, including the initial request, are delivered as a
/// single in-stream error event.
pub fn open_stream(
    upstream: UpstreamClient,
    descriptor: ModelDescriptor,
    messages: Vec<UpstreamMessage>,
) -> Response {
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(EVENT_CHANNEL_CAPACITY);
    let cancel_handle = StreamCancelHandle::new();

    let task_cancel = cancel_handle.clone();
    let request_id = get_request_id();
    tokio::spawn(REQUEST_ID.scope(request_id, async move {
        run_relay(upstream, descriptor, messages, tx, task_cancel).await;
    }));

    let events = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(Bytes::from(event.to_sse()));
        }
    };
    let body = Body::from_stream(DisconnectStream::new(events.boxed(), cancel_handle));

    sse_response(body)
}

fn sse_response(body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}

async fn run_relay(
    upstream: UpstreamClient,
    descriptor: ModelDescriptor,
    messages: Vec<UpstreamMessage>,
    tx: mpsc::Sender<StreamEvent>,
    cancel_handle: StreamCancelHandle,
) {
    let response = tokio::select! {
        _ = cancel_handle.cancelled() => {
            tracing::debug!(model = %descriptor.key, "Caller left before upstream responded");
            return;
        }
        result = upstream.send(&descriptor, &messages, true) => result,
    };

    let response = match response {
        Ok(response) => response,
        Err(err) => {
            err.log();
            let _ = tx.send(StreamEvent::Error(err.public_message())).await;
            cancel_handle.mark_completed();
            return;
        }
    };

    let fragments = get_metrics()
        .stream_fragments
        .with_label_values(&[&descriptor.key]);
    let mut relay = StreamRelay::new();
    let mut body = Box::pin(response.bytes_stream());

    while !relay.is_done() {
        let events = tokio::select! {
            _ = cancel_handle.cancelled() => {
                tracing::info!(
                    model = %descriptor.key,
                    fragments = relay.fragment_count(),
                    "Stopped reading upstream after caller disconnect"
                );
                return;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => relay.feed(&bytes),
                Some(Err(e)) => {
                    tracing::warn!(
                        model = %descriptor.key,
                        error = %e,
                        "Upstream stream read failed"
                    );
                    relay.fail(STREAM_FAILED_MESSAGE).into_iter().collect()
                }
                None => relay.finish(),
            },
        };

        for event in events {
            if matches!(event, StreamEvent::Content(_)) {
                fragments.inc();
            }
            if tx.send(event).await.is_err() {
                tracing::debug!("Event receiver dropped, ending relay");
                return;
            }
        }
    }

    cancel_handle.mark_completed();
    tracing::debug!(
        model = %descriptor.key,
        fragments = relay.fragment_count(),
        "Stream relay completed"
    );
}
