//! Inbound chat messages → upstream message schema.

use super::{ContentPart, ImageUrl, UpstreamContent, UpstreamMessage};
use crate::api::models::ChatMessage;
use crate::core::error::{AppError, Result};
use crate::services::ModelDescriptor;

/// Text sent alongside an image when the caller supplied no prompt.
pub const IMAGE_ONLY_PROMPT: &str = "Describe this image in detail.";

/// Prefix applied to raw base64 image payloads.
pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Map caller messages onto the provider's message shape for `descriptor`.
///
/// Images are only forwarded to multimodal models; for any other model they
/// are dropped and the text is sent on its own.
pub fn normalize(
    messages: &[ChatMessage],
    descriptor: &ModelDescriptor,
) -> Result<Vec<UpstreamMessage>> {
    if messages.is_empty() {
        return Err(AppError::validation("Messages are required"));
    }

    messages
        .iter()
        .enumerate()
        .map(|(position, message)| normalize_one(position, message, descriptor))
        .collect()
}

fn normalize_one(
    position: usize,
    message: &ChatMessage,
    descriptor: &ModelDescriptor,
) -> Result<UpstreamMessage> {
    let role = message.role.ok_or_else(|| {
        AppError::validation(format!("Message at index {} is missing a role", position))
    })?;

    let image = message.image.as_deref().filter(|image| !image.is_empty());

    let content = match image {
        Some(image) if descriptor.multimodal => {
            let text = if message.content.is_empty() {
                IMAGE_ONLY_PROMPT.to_string()
            } else {
                message.content.clone()
            };
            UpstreamContent::Parts(vec![
                ContentPart::Text { text },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: to_data_uri(image),
                    },
                },
            ])
        }
        Some(_) => {
            tracing::debug!(
                model = %descriptor.key,
                index = position,
                "Dropping image for text-only model"
            );
            UpstreamContent::Text(message.content.clone())
        }
        None => UpstreamContent::Text(message.content.clone()),
    };

    Ok(UpstreamMessage { role, content })
}

/// Qualified data URIs pass through; anything else is treated as raw JPEG base64.
fn to_data_uri(image: &str) -> String {
    if image.starts_with("data:") {
        image.to_string()
    } else {
        format!("{}{}", JPEG_DATA_URI_PREFIX, image)
    }
}
