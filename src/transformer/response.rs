//! Buffered response relay: upstream completion body → [`ChatResult`].

use crate::api::models::ChatResult;
use crate::core::error::{AppError, Result};
use crate::services::ModelDescriptor;
use serde_json::Value;
use std::time::Instant;

/// Response text used when the provider returned no completion.
pub const NO_RESPONSE_TEXT: &str = "No response generated";

/// Caller-facing message when the upstream error payload is unusable.
pub const GENERIC_UPSTREAM_ERROR: &str = "Failed to get response from AI model";

/// Caller-facing message when upstream throttles without a usable payload.
pub const UPSTREAM_RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Extract canonical error message from provider error payload.
pub fn extract_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
        })
        .or_else(|| {
            body.get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .filter(|s| !s.trim().is_empty())
        .map(|s| truncate_message(&s))
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = message.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{}...", truncated)
    } else {
        message.to_string()
    }
}

/// Map a non-2xx upstream status and its raw body onto the caller-facing taxonomy.
pub fn classify_upstream_error(status: u16, body: &[u8]) -> AppError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .as_ref()
        .and_then(extract_error_message);

    match status {
        401 => AppError::UpstreamAuth { status },
        429 => AppError::UpstreamRateLimited(
            message.unwrap_or_else(|| UPSTREAM_RATE_LIMIT_MESSAGE.to_string()),
        ),
        _ => AppError::Upstream {
            status,
            message: message.unwrap_or_else(|| GENERIC_UPSTREAM_ERROR.to_string()),
        },
    }
}

/// Shape a parsed completion body into the public result.
pub fn build_chat_result(
    body: &Value,
    descriptor: &ModelDescriptor,
    elapsed_millis: u64,
) -> ChatResult {
    let response_text = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())
        .unwrap_or(NO_RESPONSE_TEXT)
        .to_string();

    let usage = body.get("usage").filter(|usage| !usage.is_null()).cloned();

    ChatResult {
        response_text,
        model_display_name: descriptor.display_name.clone(),
        upstream_model_id: descriptor.upstream_id.clone(),
        elapsed_millis,
        usage,
    }
}

/// Read a successful upstream response and build the public result.
///
/// `started` is the instant the caller's request was received.
pub async fn relay(
    response: reqwest::Response,
    descriptor: &ModelDescriptor,
    started: Instant,
) -> Result<ChatResult> {
    let bytes = response.bytes().await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    let elapsed_millis = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let result = build_chat_result(&body, descriptor, elapsed_millis);
    tracing::debug!(
        model = %descriptor.key,
        elapsed_ms = result.elapsed_millis,
        has_usage = result.usage.is_some(),
        "Buffered completion relayed"
    );
    Ok(result)
}
