//! Prometheus metrics for monitoring the chat relay.
//!
//! This module provides a centralized metrics registry for tracking requests,
//! latency, upstream failures and streamed output.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, endpoint and status
    pub request_count: IntCounterVec,

    /// Request duration histogram in seconds (time to first byte for streams)
    pub request_duration: HistogramVec,

    /// Number of currently active requests by endpoint
    pub active_requests: GaugeVec,

    /// Upstream calls by model and outcome
    pub upstream_requests: IntCounterVec,

    /// Upstream latency histogram in seconds, by model
    pub upstream_latency: HistogramVec,

    /// Content fragments relayed to callers, by model
    pub stream_fragments: IntCounterVec,

    /// Requests rejected by the local rate limiter, by endpoint
    pub rate_limited: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// This should be called once at application startup. Subsequent calls will
/// return the same instance.
///
/// # Examples
///
/// ```no_run
/// use llm_chat_relay::core::metrics::init_metrics;
///
/// let metrics = init_metrics();
/// metrics.request_count.with_label_values(&["GET", "/api/health", "200"]).inc();
/// ```
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "chat_relay_requests_total",
            "Total number of requests",
            &["method", "endpoint", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "chat_relay_request_duration_seconds",
            "Request duration in seconds",
            &["method", "endpoint"],
            vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]
        )
        .expect("Failed to register request_duration metric");

        let active_requests = register_gauge_vec!(
            "chat_relay_active_requests",
            "Number of active requests",
            &["endpoint"]
        )
        .expect("Failed to register active_requests metric");

        let upstream_requests = register_int_counter_vec!(
            "chat_relay_upstream_requests_total",
            "Upstream calls by model and outcome",
            &["model", "outcome"]
        )
        .expect("Failed to register upstream_requests metric");

        let upstream_latency = register_histogram_vec!(
            "chat_relay_upstream_latency_seconds",
            "Upstream response latency in seconds (headers received)",
            &["model"],
            vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]
        )
        .expect("Failed to register upstream_latency metric");

        let stream_fragments = register_int_counter_vec!(
            "chat_relay_stream_fragments_total",
            "Content fragments relayed to callers",
            &["model"]
        )
        .expect("Failed to register stream_fragments metric");

        let rate_limited = register_int_counter_vec!(
            "chat_relay_rate_limited_total",
            "Requests rejected by the local rate limiter",
            &["endpoint"]
        )
        .expect("Failed to register rate_limited metric");

        Metrics {
            request_count,
            request_duration,
            active_requests,
            upstream_requests,
            upstream_latency,
            stream_fragments,
            rate_limited,
        }
    })
}

/// Get the global metrics instance, registering it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}
