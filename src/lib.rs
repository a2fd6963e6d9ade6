//! LLM Chat Relay - a thin server-side proxy between a web chat client and an
//! upstream chat-completions provider.
//!
//! The relay keeps the provider credential on the server and offers:
//!
//! - **Model Registry**: short, stable model keys mapped to upstream ids and
//!   capability flags
//! - **Request Normalization**: caller messages (with optional images) mapped
//!   onto the provider's message schema
//! - **Buffered and Streamed Relays**: single-shot JSON results and a
//!   simplified Server-Sent Events stream
//! - **Abuse Controls**: per-caller rate limiting and a CORS allow-list
//! - **Metrics & Monitoring**: Prometheus metrics and structured logging
//!
//! # Architecture
//!
//! - [`core`]: configuration, errors, logging context, metrics, middleware,
//!   rate limiting and stream cancellation
//! - [`services`]: the model registry
//! - [`transformer`]: request normalization and response relays
//! - [`api`]: HTTP handlers, upstream client and router assembly
//!
//! # Configuration
//!
//! Required for chat and stream endpoints:
//! - `OPENROUTER_API_KEY`: upstream provider credential
//!
//! Optional environment variables:
//! - `HOST`: Server bind address (default: 0.0.0.0)
//! - `PORT`: Server port (default: 3000)
//! - `ALLOWED_ORIGINS`: comma-separated CORS allow-list (default: any origin)
//! - `RATE_LIMIT_WINDOW_MS` / `RATE_LIMIT_MAX_REQUESTS`: (default: 60000 / 30)
//! - `UPSTREAM_URL`: chat-completions endpoint (default: OpenRouter)
//! - `MODEL_REGISTRY_PATH`: JSON file replacing the built-in models
//! - `STATIC_DIR`: front-end directory served with SPA fallback

pub mod api;
pub mod core;
pub mod services;
pub mod transformer;

// Re-export commonly used types for convenience
pub use api::{create_router, ApiDoc, AppState};
pub use core::{AppConfig, AppError, Result};
pub use services::{ModelDescriptor, ModelRegistry};
