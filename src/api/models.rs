//! API request and response models.
//!
//! Public JSON shapes of the relay. Field names are camelCase on the wire.

use crate::services::ModelDescriptor;
use crate::transformer::Role;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body accepted by `/api/chat` and `/api/stream`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "model": "gpt-4o-mini",
    "messages": [
        {"role": "system", "content": "You are a helpful assistant."},
        {"role": "user", "content": "What is in this picture?", "image": "data:image/png;base64,iVBORw0KGgo="}
    ]
}))]
pub struct ChatRequest {
    /// Registry key of the model to use
    #[serde(default)]
    pub model: Option<String>,

    /// Conversation so far, oldest first
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// One caller-supplied message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Option<Role>,

    #[serde(default)]
    pub content: String,

    /// Data URI or raw base64 image payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Result of a buffered chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "responseText": "Hello! How can I help?",
    "modelDisplayName": "GPT-4o mini",
    "upstreamModelId": "openai/gpt-4o-mini",
    "elapsedMillis": 812,
    "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
}))]
pub struct ChatResult {
    pub response_text: String,
    pub model_display_name: String,
    pub upstream_model_id: String,
    /// Wall-clock time from request receipt to response construction
    pub elapsed_millis: u64,
    /// Token usage as reported by the provider, passed through unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub usage: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    pub models: Vec<ModelDescriptor>,
    pub default_model: String,
}

/// Error body. `availableModels` accompanies unknown-model errors and
/// `retryAfter` accompanies local rate-limit rejections.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}
