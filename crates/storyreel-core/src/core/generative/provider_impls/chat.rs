//! Chat-style dialect
//!
//! Analysis goes through `chat/completions` with a system message and a user
//! message made of typed content blocks. Images use `images/generations`.

use serde::Serialize;

use super::{WireDialect, WireRequest};
use crate::core::generative::analysis::AnalysisParams;
use crate::core::generative::image::ImageParams;
use crate::core::generative::media::ImagePayload;
use crate::core::generative::providers::ProviderFamily;
use crate::core::settings::EndpointSettings;

/// Default analysis model
pub const DEFAULT_ANALYSIS_MODEL: &str = "gpt-4o";

/// Default image model
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";

#[derive(Debug, Clone, Copy, Default)]
pub struct ChatDialect;

// =============================================================================
// API Types
// =============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ImageGenerationRequest {
    model: String,
    prompt: String,
    size: String,
    n: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    image: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strength: Option<f32>,
}

// =============================================================================
// Request Building
// =============================================================================

impl WireDialect for ChatDialect {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::ChatStyle
    }

    fn analysis_request(
        &self,
        endpoint: &EndpointSettings,
        params: &AnalysisParams,
        images: &[ImagePayload],
    ) -> WireRequest {
        let mut messages = Vec::with_capacity(2);
        if !params.system.trim().is_empty() {
            messages.push(Message {
                role: "system",
                content: MessageContent::Text(params.system.clone()),
            });
        }

        let mut blocks = Vec::with_capacity(images.len() + 1);
        if !params.text.trim().is_empty() {
            blocks.push(ContentBlock::Text {
                text: params.text.clone(),
            });
        }
        blocks.extend(images.iter().map(|image| ContentBlock::ImageUrl {
            image_url: ImageUrl {
                url: image.to_url(),
            },
        }));
        messages.push(Message {
            role: "user",
            content: MessageContent::Blocks(blocks),
        });

        let body = ChatCompletionRequest {
            model: endpoint
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            messages,
        };
        WireRequest::bearer(
            format!("{}/chat/completions", endpoint.base()),
            &endpoint.api_key,
            serde_json::to_value(body).unwrap_or_default(),
        )
    }

    fn image_request(
        &self,
        endpoint: &EndpointSettings,
        params: &ImageParams,
        references: &[ImagePayload],
    ) -> WireRequest {
        let body = ImageGenerationRequest {
            model: endpoint
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            prompt: params.prompt.clone(),
            size: params.size(),
            n: 1,
            image: references.iter().map(ImagePayload::to_url).collect(),
            strength: (!references.is_empty()).then_some(params.strength),
        };
        WireRequest::bearer(
            format!("{}/images/generations", endpoint.base()),
            &endpoint.api_key,
            serde_json::to_value(body).unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint() -> EndpointSettings {
        EndpointSettings::new("https://chat.example.com/v1", "sk-test")
    }

    #[test]
    fn test_analysis_request_shape() {
        let params = AnalysisParams::new("Be terse", "Describe");
        let images = vec![ImagePayload::Remote("https://cdn/a.png".into())];
        let request = ChatDialect.analysis_request(&endpoint(), &params, &images);

        assert_eq!(request.url, "https://chat.example.com/v1/chat/completions");
        assert_eq!(
            request.headers,
            vec![("Authorization", "Bearer sk-test".to_string())]
        );
        assert_eq!(
            request.body,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "Be terse"},
                    {"role": "user", "content": [
                        {"type": "text", "text": "Describe"},
                        {"type": "image_url", "image_url": {"url": "https://cdn/a.png"}}
                    ]}
                ]
            })
        );
    }

    #[test]
    fn test_image_request_text_only() {
        let params = ImageParams::new("a harbor at dawn").with_aspect_ratio("9:16");
        let request = ChatDialect.image_request(&endpoint(), &params, &[]);
        assert_eq!(request.url, "https://chat.example.com/v1/images/generations");
        assert_eq!(
            request.body,
            json!({"model": "gpt-image-1", "prompt": "a harbor at dawn", "size": "720x1280", "n": 1})
        );
    }

    #[test]
    fn test_image_request_with_references() {
        let params = ImageParams::new("x").with_strength(0.4);
        let refs = vec![ImagePayload::Inline {
            mime_type: "image/jpeg".into(),
            data: "QQ==".into(),
        }];
        let request = ChatDialect.image_request(&endpoint(), &params, &refs);
        assert_eq!(request.body["image"], json!(["data:image/jpeg;base64,QQ=="]));
        assert!((request.body["strength"].as_f64().unwrap() - 0.4).abs() < 1e-6);
    }
}
