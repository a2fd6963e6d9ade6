//! API layer for the chat relay.
//!
//! This module contains the HTTP handlers, request/response models, the
//! upstream client and streaming support, plus [`create_router`] which
//! assembles them with the middleware stack.

pub mod disconnect;
pub mod handlers;
pub mod models;
pub mod streaming;
pub mod upstream;

use crate::core::config::CorsConfig;
use crate::core::{rate_limit_middleware, request_id_middleware, MetricsMiddleware};
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Re-export commonly used types
pub use handlers::{chat, health, list_models, metrics_handler, stream, ApiDoc, AppState};
pub use models::{ChatMessage, ChatRequest, ChatResult, HealthResponse, ModelsResponse};
pub use upstream::UpstreamClient;

/// Build the full application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let rate_limited_routes = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/stream", post(stream))
        .layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .with_state(state.clone());

    let open_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/models", get(list_models))
        .with_state(state.clone());

    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    let router = Router::new()
        .merge(rate_limited_routes)
        .merge(open_routes)
        .merge(swagger_ui)
        .route("/metrics", get(metrics_handler));

    let router = match state.config.static_dir.as_deref() {
        Some(dir) => {
            let index = Path::new(dir).join("index.html");
            router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => router.fallback(handlers::not_found),
    };

    router
        .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
}

/// CORS policy: the configured allow-list, or any origin when none is set.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.is_permissive() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
