//! Core functionality for the chat relay.
//!
//! This module contains the cross-cutting pieces used by the API layer:
//! - Configuration loading
//! - Error handling
//! - Request-scoped logging context
//! - Metrics collection and HTTP middleware
//! - Rate limiting and stream cancellation

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod rate_limiter;

// Re-export commonly used types
pub use cancel::StreamCancelHandle;
pub use config::{AppConfig, CorsConfig, RateLimitConfig, ServerConfig, UpstreamConfig};
pub use error::{AppError, Result};
pub use logging::{generate_request_id, get_request_id, REQUEST_ID};
pub use metrics::{get_metrics, init_metrics, Metrics};
pub use middleware::{
    rate_limit_middleware, request_id_middleware, MetricsMiddleware, RequestStart,
};
pub use rate_limiter::RateLimiter;
