//! Native `generateContent` dialect
//!
//! Text and images travel in one combined `contents[].parts[]` list, system
//! instructions in `systemInstruction`. The API key goes in the
//! `x-goog-api-key` header so it never shows up in logged URLs.

use serde::Serialize;

use super::{WireDialect, WireRequest};
use crate::core::generative::analysis::AnalysisParams;
use crate::core::generative::image::ImageParams;
use crate::core::generative::media::ImagePayload;
use crate::core::generative::providers::ProviderFamily;
use crate::core::settings::EndpointSettings;

/// Default analysis model
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";

/// Default image model
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDialect;

// =============================================================================
// API Types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        inline_data: Blob,
    },
    File {
        file_data: FileData,
    },
}

#[derive(Serialize)]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

// =============================================================================
// Request Building
// =============================================================================

fn image_part(payload: &ImagePayload) -> Part {
    match payload {
        ImagePayload::Inline { mime_type, data } => Part::Inline {
            inline_data: Blob {
                mime_type: mime_type.clone(),
                data: data.clone(),
            },
        },
        ImagePayload::Remote(url) => Part::File {
            file_data: FileData {
                mime_type: guess_image_mime(url).to_string(),
                file_uri: url.clone(),
            },
        },
    }
}

fn guess_image_mime(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default().to_ascii_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

fn generate_content_url(endpoint: &EndpointSettings, default_model: &str) -> String {
    let model = endpoint.model.as_deref().unwrap_or(default_model);
    format!("{}/models/{}:generateContent", endpoint.base(), model)
}

fn to_request(endpoint: &EndpointSettings, url: String, body: GenerateContentRequest) -> WireRequest {
    WireRequest {
        url,
        headers: vec![("x-goog-api-key", endpoint.api_key.clone())],
        body: serde_json::to_value(body).unwrap_or_default(),
    }
}

impl WireDialect for NativeDialect {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Native
    }

    fn analysis_request(
        &self,
        endpoint: &EndpointSettings,
        params: &AnalysisParams,
        images: &[ImagePayload],
    ) -> WireRequest {
        let mut parts = Vec::with_capacity(images.len() + 1);
        if !params.text.trim().is_empty() {
            parts.push(Part::Text {
                text: params.text.clone(),
            });
        }
        parts.extend(images.iter().map(image_part));

        let system_instruction = if params.system.trim().is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part::Text {
                    text: params.system.clone(),
                }],
            })
        };

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction,
            generation_config: None,
        };
        to_request(
            endpoint,
            generate_content_url(endpoint, DEFAULT_ANALYSIS_MODEL),
            body,
        )
    }

    fn image_request(
        &self,
        endpoint: &EndpointSettings,
        params: &ImageParams,
        references: &[ImagePayload],
    ) -> WireRequest {
        let mut parts: Vec<Part> = references.iter().map(image_part).collect();
        parts.push(Part::Text {
            text: params.prompt.clone(),
        });

        // generateContent has no conditioning strength or pixel size; the
        // references ride as parts and only the ratio is configurable.
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: Some(ImageConfig {
                    aspect_ratio: params.ratio().as_str().to_string(),
                }),
            }),
        };
        to_request(
            endpoint,
            generate_content_url(endpoint, DEFAULT_IMAGE_MODEL),
            body,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint() -> EndpointSettings {
        EndpointSettings::new("https://native.example.com/v1beta/", "key-1")
    }

    #[test]
    fn test_analysis_request_shape() {
        let params = AnalysisParams::new("You are a script supervisor", "INT. DINER - NIGHT");
        let images = vec![ImagePayload::Inline {
            mime_type: "image/png".into(),
            data: "AAAA".into(),
        }];
        let request = NativeDialect.analysis_request(&endpoint(), &params, &images);

        assert_eq!(
            request.url,
            "https://native.example.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(request.headers, vec![("x-goog-api-key", "key-1".to_string())]);
        assert_eq!(
            request.body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "INT. DINER - NIGHT"},
                        {"inline_data": {"mime_type": "image/png", "data": "AAAA"}}
                    ]
                }],
                "systemInstruction": {"parts": [{"text": "You are a script supervisor"}]}
            })
        );
    }

    #[test]
    fn test_image_request_with_remote_reference() {
        let params = ImageParams::new("a lighthouse").with_aspect_ratio("16:9");
        let refs = vec![ImagePayload::Remote("https://cdn/a.JPG?x=1".into())];
        let request = NativeDialect.image_request(&endpoint().with_model("img-model"), &params, &refs);

        assert!(request.url.ends_with("/models/img-model:generateContent"));
        assert_eq!(
            request.body["contents"][0]["parts"][0]["file_data"]["mime_type"],
            "image/jpeg"
        );
        assert_eq!(request.body["contents"][0]["parts"][1]["text"], "a lighthouse");
        assert_eq!(
            request.body["generationConfig"],
            json!({"responseModalities": ["IMAGE"], "imageConfig": {"aspectRatio": "16:9"}})
        );
    }

    #[test]
    fn test_image_request_sends_only_ratio() {
        let params = ImageParams::new("a lighthouse")
            .with_aspect_ratio("9:16")
            .with_strength(0.4);
        let refs = vec![ImagePayload::Remote("https://cdn/a.png".into())];
        let request = NativeDialect.image_request(&endpoint(), &params, &refs);

        assert!(request.body.get("strength").is_none());
        assert!(request.body.get("size").is_none());
        assert_eq!(
            request.body["generationConfig"]["imageConfig"],
            json!({"aspectRatio": "9:16"})
        );
    }
}
