//! Error types and handling for the chat relay.
//!
//! This module provides a unified error type [`AppError`] that covers every
//! per-request failure and knows how to render itself for the caller.
//! Credential-related detail is logged server-side and never rendered.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Message shown to callers for any server-side configuration or credential problem.
pub const CONFIGURATION_ERROR_MESSAGE: &str = "Server configuration error";

/// Message shown to callers when the upstream provider cannot be reached.
pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str = "Upstream service unavailable";

/// Message shown to callers throttled by the local rate limiter.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad or missing model key, empty message list, malformed body
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        available_models: Option<Vec<String>>,
    },

    /// Server misconfiguration, e.g. missing upstream credential
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Upstream rejected our credential
    #[error("Upstream authentication failed with status {status}")]
    UpstreamAuth { status: u16 },

    /// Upstream throttled us
    #[error("Upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    /// Any other non-2xx upstream status
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Network failure talking to the upstream
    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local per-caller rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            available_models: None,
        }
    }

    /// Validation error that also lists the model keys the caller may use.
    pub fn unknown_model(message: impl Into<String>, available_models: Vec<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            available_models: Some(available_models),
        }
    }

    /// HTTP status presented to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) | AppError::UpstreamAuth { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::UpstreamRateLimited(_) | AppError::RateLimitExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::Transport(_) | AppError::Serialization(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message that is safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation { message, .. } => message.clone(),
            AppError::Configuration(_) | AppError::UpstreamAuth { .. } => {
                CONFIGURATION_ERROR_MESSAGE.to_string()
            }
            AppError::UpstreamRateLimited(message) => message.clone(),
            AppError::Upstream { message, .. } => message.clone(),
            AppError::Transport(_) => UPSTREAM_UNAVAILABLE_MESSAGE.to_string(),
            AppError::RateLimitExceeded { .. } => RATE_LIMITED_MESSAGE.to_string(),
            AppError::Serialization(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Emit the server-side log line for this failure. Detail that is hidden
    /// from callers only ever appears here.
    pub fn log(&self) {
        match self {
            AppError::Validation { message, .. } => {
                tracing::debug!(error = %message, "Rejected invalid request");
            }
            AppError::Configuration(detail) => {
                tracing::error!(detail = %detail, "Server configuration error");
            }
            AppError::UpstreamAuth { status } => {
                tracing::error!(
                    upstream_status = status,
                    "Upstream rejected the configured credential"
                );
            }
            AppError::UpstreamRateLimited(message) => {
                tracing::warn!(error = %message, "Upstream rate limited the request");
            }
            AppError::Upstream { status, message } => {
                tracing::warn!(
                    upstream_status = status,
                    error = %message,
                    "Upstream returned an error"
                );
            }
            AppError::Transport(e) => {
                tracing::error!(
                    error = %e,
                    is_timeout = e.is_timeout(),
                    is_connect = e.is_connect(),
                    "Upstream request failed"
                );
            }
            AppError::RateLimitExceeded { .. } => {}
            AppError::Serialization(e) => {
                tracing::error!(error = %e, "Serialization error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
            }
        }
    }

    /// JSON body presented to the caller.
    pub fn body(&self) -> Value {
        let mut body = json!({ "error": self.public_message() });
        match self {
            AppError::Validation {
                available_models: Some(models),
                ..
            } => {
                body["availableModels"] = json!(models);
            }
            AppError::RateLimitExceeded { retry_after_secs } => {
                body["retryAfter"] = json!(retry_after_secs);
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let retry_after = match &self {
            AppError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let mut response = (status, Json(self.body())).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
