//! Image Generation
//!
//! Parameters for still-image generation, optionally conditioned on
//! reference images.

use serde::{Deserialize, Serialize};

use crate::core::{AspectRatio, MediaRef};

/// Conditioning strength used when none is specified
pub const DEFAULT_STRENGTH: f32 = 0.65;

/// Parameters for image generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    /// Prompt describing the image
    pub prompt: String,
    /// Requested ratio string; unknown values fall back to 1:1
    pub aspect_ratio: String,
    /// Whether reference images should condition the output
    pub use_conditioning: bool,
    /// Main reference (usually the first cast portrait)
    pub primary_reference: Option<MediaRef>,
    /// Additional references in priority order
    pub secondary_references: Vec<MediaRef>,
    /// Conditioning strength (0.0 - 1.0)
    pub strength: f32,
}

impl ImageParams {
    /// Creates text-only image parameters
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::Square.as_str().to_string(),
            use_conditioning: false,
            primary_reference: None,
            secondary_references: Vec::new(),
            strength: DEFAULT_STRENGTH,
        }
    }

    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = ratio.into();
        self
    }

    /// Enables conditioning on the given references
    pub fn with_references(mut self, primary: Option<MediaRef>, secondary: Vec<MediaRef>) -> Self {
        self.use_conditioning = true;
        self.primary_reference = primary;
        self.secondary_references = secondary;
        self
    }

    /// Sets the conditioning strength, clamped to 0.0 - 1.0
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = clamp_strength(strength);
        self
    }

    /// Resolved ratio
    pub fn ratio(&self) -> AspectRatio {
        AspectRatio::parse_or_default(&self.aspect_ratio)
    }

    /// Size string sent to providers, e.g. `"1280x720"`
    pub fn size(&self) -> String {
        let (width, height) = self.ratio().pixel_size();
        format!("{}x{}", width, height)
    }

    /// References in submission order: primary first, then secondaries
    pub fn references(&self) -> impl Iterator<Item = &MediaRef> {
        self.primary_reference
            .iter()
            .chain(self.secondary_references.iter())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Prompt cannot be empty".to_string());
        }
        Ok(())
    }
}

fn clamp_strength(strength: f32) -> f32 {
    if strength.is_finite() {
        strength.clamp(0.0, 1.0)
    } else {
        DEFAULT_STRENGTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mapping() {
        assert_eq!(ImageParams::new("x").size(), "1024x1024");
        assert_eq!(
            ImageParams::new("x").with_aspect_ratio("2.35:1").size(),
            "1504x640"
        );
        assert_eq!(
            ImageParams::new("x").with_aspect_ratio("21:9").size(),
            "1024x1024"
        );
    }

    #[test]
    fn test_strength_clamped() {
        assert_eq!(ImageParams::new("x").with_strength(3.0).strength, 1.0);
        assert_eq!(ImageParams::new("x").with_strength(-1.0).strength, 0.0);
        assert_eq!(
            ImageParams::new("x").with_strength(f32::NAN).strength,
            DEFAULT_STRENGTH
        );
    }

    #[test]
    fn test_reference_order() {
        let params = ImageParams::new("x").with_references(
            Some("https://a/1.png".to_string()),
            vec!["https://a/2.png".to_string()],
        );
        assert!(params.use_conditioning);
        let refs: Vec<_> = params.references().cloned().collect();
        assert_eq!(refs, vec!["https://a/1.png", "https://a/2.png"]);
    }

    #[test]
    fn test_validate() {
        assert!(ImageParams::new("  ").validate().is_err());
        assert!(ImageParams::new("a castle").validate().is_ok());
    }
}
