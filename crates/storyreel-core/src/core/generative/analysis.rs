//! Text Analysis
//!
//! Parameters for multimodal text analysis requests.

use serde::{Deserialize, Serialize};

use crate::core::MediaRef;

/// Parameters for an analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisParams {
    /// System instructions
    pub system: String,
    /// User text
    pub text: String,
    /// Images sent alongside the text
    pub images: Vec<MediaRef>,
}

impl AnalysisParams {
    pub fn new(system: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<MediaRef>) -> Self {
        self.images.push(image.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() && self.images.is_empty() {
            return Err("Analysis request needs text or at least one image".to_string());
        }
        Ok(())
    }
}
