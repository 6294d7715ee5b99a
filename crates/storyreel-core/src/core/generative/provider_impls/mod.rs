//! Wire Dialects
//!
//! Analysis and image requests differ between provider families in request
//! shape, endpoint and auth header. A dialect is selected once from the
//! configured [`ProviderFamily`] and owns both directions of the mapping.

pub mod chat;
pub mod native;

pub use chat::ChatDialect;
pub use native::NativeDialect;

use serde_json::Value;

use super::analysis::AnalysisParams;
use super::image::ImageParams;
use super::media::ImagePayload;
use super::providers::ProviderFamily;
use super::shapes::{self, ImageHit};
use crate::core::settings::EndpointSettings;

/// A fully built HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl WireRequest {
    /// POST with bearer auth, used by every common REST kind
    pub fn bearer(url: String, api_key: &str, body: Value) -> Self {
        Self {
            url,
            headers: vec![("Authorization", format!("Bearer {}", api_key))],
            body,
        }
    }
}

/// Request builder and response parser for one provider family
pub trait WireDialect: Send + Sync + std::fmt::Debug {
    fn family(&self) -> ProviderFamily;

    /// Builds a text analysis request
    fn analysis_request(
        &self,
        endpoint: &EndpointSettings,
        params: &AnalysisParams,
        images: &[ImagePayload],
    ) -> WireRequest;

    /// Builds an image request. `references` is empty for text-only generation.
    fn image_request(
        &self,
        endpoint: &EndpointSettings,
        params: &ImageParams,
        references: &[ImagePayload],
    ) -> WireRequest;

    fn parse_text(&self, body: &Value) -> Option<String> {
        shapes::probe_text(body)
    }

    fn parse_image(&self, body: &Value) -> Option<ImageHit> {
        shapes::probe_image(body)
    }
}

/// Dialect for a provider family
pub fn dialect_for(family: ProviderFamily) -> Box<dyn WireDialect> {
    match family {
        ProviderFamily::Native => Box::new(NativeDialect),
        ProviderFamily::ChatStyle => Box::new(ChatDialect),
    }
}
