//! HTTP request handlers for the chat relay API.
//!
//! This module contains the endpoint handlers for health, model listing,
//! buffered chat, streamed chat and metrics.

use crate::api::models::*;
use crate::api::streaming::open_stream;
use crate::api::upstream::UpstreamClient;
use crate::core::config::AppConfig;
use crate::core::error::{AppError, Result};
use crate::core::middleware::RequestStart;
use crate::core::rate_limiter::RateLimiter;
use crate::services::{ModelDescriptor, ModelRegistry};
use crate::transformer::{normalize, relay, UpstreamMessage};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use utoipa::OpenApi;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
    pub upstream: UpstreamClient,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig, registry: ModelRegistry) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            upstream,
            rate_limiter,
        })
    }
}

/// OpenAPI document for the public API.
#[derive(OpenApi)]
#[openapi(
    paths(health, list_models, chat, stream),
    components(schemas(
        ChatRequest,
        ChatMessage,
        ChatResult,
        HealthResponse,
        ModelsResponse,
        ErrorResponse,
        ModelDescriptor,
        crate::transformer::Role
    )),
    tags(
        (name = "chat", description = "Chat completion relay"),
        (name = "system", description = "Service status and model catalogue")
    )
)]
pub struct ApiDoc;

/// Turn a body rejection into a caller-visible validation error.
fn parse_body(
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<ChatRequest> {
    payload.map(|Json(request)| request).map_err(|rejection| {
        AppError::validation(format!("Invalid request body: {}", rejection.body_text()))
    })
}

/// Resolve the model and normalize messages. Runs before any upstream call.
fn prepare(
    state: &AppState,
    request: &ChatRequest,
) -> Result<(ModelDescriptor, Vec<UpstreamMessage>)> {
    let key = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::unknown_model("Model is required", state.registry.keys()))?;

    let descriptor = state.registry.lookup(key).cloned().ok_or_else(|| {
        AppError::unknown_model(
            format!("Invalid model selected: {}", key),
            state.registry.keys(),
        )
    })?;

    let messages = normalize(&request.messages, &descriptor)?;
    state.upstream.ensure_credential()?;

    Ok((descriptor, messages))
}

/// Basic health check endpoint.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "system",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: state.config.service_name.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// List the models callers may select.
#[utoipa::path(
    get,
    path = "/api/models",
    tag = "system",
    responses((status = 200, description = "Registered models in display order", body = ModelsResponse))
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.registry.list().to_vec(),
        default_model: state.registry.default_key().to_string(),
    })
}

/// Buffered chat completion.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Completion relayed", body = ChatResult),
        (status = 400, description = "Invalid model or messages", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
        (status = 500, description = "Server or upstream failure", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    request_start: Option<Extension<RequestStart>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResult>> {
    let started = request_start
        .map(|Extension(RequestStart(at))| at)
        .unwrap_or_else(Instant::now);
    let request = parse_body(payload)?;
    let (descriptor, messages) = prepare(&state, &request)?;

    tracing::debug!(
        model = %descriptor.key,
        messages = messages.len(),
        "Processing chat request"
    );

    let response = state.upstream.send(&descriptor, &messages, false).await?;
    let result = relay(response, &descriptor, started).await?;

    tracing::info!(
        model = %descriptor.key,
        elapsed_ms = result.elapsed_millis,
        "Chat request completed"
    );
    Ok(Json(result))
}

/// Streamed chat completion over Server-Sent Events.
#[utoipa::path(
    post,
    path = "/api/stream",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Event stream of `{content}` fragments ending in `[DONE]` or `{error}`", content_type = "text/event-stream", body = String),
        (status = 400, description = "Invalid model or messages", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
        (status = 500, description = "Server configuration error", body = ErrorResponse)
    )
)]
pub async fn stream(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response> {
    let request = parse_body(payload)?;
    let (descriptor, messages) = prepare(&state, &request)?;

    tracing::debug!(
        model = %descriptor.key,
        messages = messages.len(),
        "Opening chat stream"
    );

    Ok(open_stream(state.upstream.clone(), descriptor, messages))
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response())
}

/// JSON 404 for unmatched routes when no front-end is served.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
        .into_response()
}
