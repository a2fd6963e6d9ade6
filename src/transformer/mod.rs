//! Translation between the service's public chat shape and the upstream
//! provider's chat-completions schema.
//!
//! ```text
//! Caller request
//!     ↓
//! [normalize]        ← ChatMessage → UpstreamMessage
//!     ↓
//! Upstream provider
//!     ↓
//! [response::relay]  ← buffered body → ChatResult
//! [stream::StreamRelay] ← SSE byte chunks → StreamEvent
//!     ↓
//! Caller response
//! ```

pub mod normalize;
pub mod response;
pub mod stream;

use serde::{Deserialize, Serialize};

pub use normalize::{normalize, IMAGE_ONLY_PROMPT, JPEG_DATA_URI_PREFIX};
pub use response::{
    build_chat_result, classify_upstream_error, extract_error_message, relay, NO_RESPONSE_TEXT,
};
pub use stream::{RelayState, StreamEvent, StreamRelay};

/// Fixed generation limit sent with every upstream request.
pub const MAX_TOKENS: u32 = 4096;

/// Fixed sampling temperature sent with every upstream request.
pub const TEMPERATURE: f32 = 0.7;

/// Message role, shared by inbound and upstream shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Provider-shaped chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub role: Role,
    pub content: UpstreamContent,
}

/// Message body: plain text, or text plus image parts for multimodal models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpstreamContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Body posted to the upstream chat-completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [UpstreamMessage],
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl<'a> UpstreamRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [UpstreamMessage], stream: bool) -> Self {
        Self {
            model,
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stream,
        }
    }
}
