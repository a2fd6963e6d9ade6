//! HTTP middleware for request tracking, metrics and rate limiting.

use crate::core::logging::{generate_request_id, REQUEST_ID};
use crate::core::metrics::get_metrics;
use crate::core::rate_limiter::RateLimiter;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Response header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Derive the caller key used for rate limiting.
///
/// The peer address identifies the caller. With `trust_proxy` the first
/// `X-Forwarded-For` hop, then `X-Real-IP`, take precedence over it.
pub fn caller_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(ip) = forwarded_client(headers) {
            return ip;
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Instant the request reached the service, before its body was read.
#[derive(Debug, Clone, Copy)]
pub struct RequestStart(pub Instant);

/// Assign a request id, run the rest of the stack inside its scope and echo
/// it back on the response. An inbound `x-request-id` is reused.
///
/// Also stamps the request with its [`RequestStart`].
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestStart(Instant::now()));

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let mut response = REQUEST_ID
        .scope(request_id.clone(), next.run(request))
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Reject callers over their budget before the request reaches a handler.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = caller_key(request.headers(), peer, limiter.trusts_proxy());

    if let Err(err) = limiter.check_rate_limit(&key) {
        get_metrics()
            .rate_limited
            .with_label_values(&[request.uri().path()])
            .inc();
        return err.into_response();
    }

    next.run(request).await
}

/// Label used for per-endpoint metrics. Front-end and docs paths share one
/// label each to keep cardinality bounded.
fn metric_endpoint(path: &str) -> String {
    if path.starts_with("/api/") || path == "/metrics" {
        path.to_string()
    } else if path.starts_with("/swagger-ui") || path.starts_with("/api-docs") {
        "docs".to_string()
    } else {
        "static".to_string()
    }
}

/// Metrics middleware for tracking HTTP requests.
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Track request count, duration and in-flight requests.
    ///
    /// For streaming responses the recorded duration is time to first byte,
    /// since `next.run()` returns once headers are ready.
    pub async fn track_metrics(request: Request, next: Next) -> Response {
        let endpoint = metric_endpoint(request.uri().path());
        let method = request.method().to_string();

        if endpoint == "/metrics" {
            return next.run(request).await;
        }

        let metrics = get_metrics();
        metrics
            .active_requests
            .with_label_values(&[&endpoint])
            .inc();

        let start = Instant::now();
        let response = next.run(request).await;
        let duration = start.elapsed().as_secs_f64();
        let status_code = response.status().as_u16().to_string();

        metrics
            .request_count
            .with_label_values(&[&method, &endpoint, &status_code])
            .inc();
        metrics
            .request_duration
            .with_label_values(&[&method, &endpoint])
            .observe(duration);

        let is_streaming = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/event-stream"))
            .unwrap_or(false);

        if is_streaming {
            tracing::info!(
                "{} {} - status={} ttfb={:.3}s",
                method,
                endpoint,
                status_code,
                duration
            );
        } else {
            tracing::info!(
                "{} {} - status={} duration={:.3}s",
                method,
                endpoint,
                status_code,
                duration
            );
        }

        metrics
            .active_requests
            .with_label_values(&[&endpoint])
            .dec();

        response
    }
}
