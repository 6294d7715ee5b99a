//! StoryReel Core Type Definitions
//!
//! Defines fundamental types used throughout the project.
//! All types are exported to TypeScript via specta.

use serde::{Deserialize, Serialize};
use specta::Type;
use tracing::warn;

// =============================================================================
// ID Types
// =============================================================================

/// Shot unique identifier (ULID)
pub type ShotId = String;

/// Actor unique identifier (ULID)
pub type ActorId = String;

/// Scene unique identifier (ULID)
pub type SceneId = String;

/// Version unique identifier (ULID)
pub type VersionId = String;

/// Opaque media handle: `blob:<id>`, a `data:` URL, or an `http(s)` URL.
///
/// See [`crate::core::assets::MediaSource`] for parsing.
pub type MediaRef = String;

/// Generates a new ULID string identifier
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Current time as unix seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// =============================================================================
// Aspect Ratio
// =============================================================================

/// Aspect ratios accepted by the image and video generation kinds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "2.35:1")]
    Anamorphic,
    #[serde(rename = "3:4")]
    Portrait,
}

impl AspectRatio {
    /// Returns all supported ratios
    pub fn all() -> [AspectRatio; 5] {
        [
            AspectRatio::Square,
            AspectRatio::Widescreen,
            AspectRatio::Vertical,
            AspectRatio::Anamorphic,
            AspectRatio::Portrait,
        ]
    }

    /// Wire/display form, e.g. `"16:9"`
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Anamorphic => "2.35:1",
            AspectRatio::Portrait => "3:4",
        }
    }

    /// Fixed pixel size `(width, height)` requested from image providers
    pub fn pixel_size(&self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Widescreen => (1280, 720),
            AspectRatio::Vertical => (720, 1280),
            AspectRatio::Anamorphic => (1504, 640),
            AspectRatio::Portrait => (768, 1024),
        }
    }

    /// Parses a ratio string, falling back to 1:1 for anything unknown
    pub fn parse_or_default(value: &str) -> Self {
        let trimmed = value.trim();
        match AspectRatio::all()
            .into_iter()
            .find(|ratio| ratio.as_str() == trimmed)
        {
            Some(ratio) => ratio,
            None => {
                warn!("Unknown aspect ratio '{}', defaulting to 1:1", value);
                AspectRatio::Square
            }
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_pixel_sizes_are_distinct() {
        let sizes: Vec<_> = AspectRatio::all().iter().map(|r| r.pixel_size()).collect();
        for (i, a) in sizes.iter().enumerate() {
            for b in sizes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert_eq!(AspectRatio::Widescreen.pixel_size(), (1280, 720));
    }

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!(AspectRatio::parse_or_default("16:9"), AspectRatio::Widescreen);
        assert_eq!(AspectRatio::parse_or_default(" 2.35:1 "), AspectRatio::Anamorphic);
        assert_eq!(AspectRatio::parse_or_default("4:3"), AspectRatio::Square);
        assert_eq!(AspectRatio::parse_or_default(""), AspectRatio::Square);
    }

    #[test]
    fn test_aspect_ratio_serialization() {
        assert_eq!(
            serde_json::to_string(&AspectRatio::Anamorphic).unwrap(),
            "\"2.35:1\""
        );
        assert_eq!(
            serde_json::from_str::<AspectRatio>("\"9:16\"").unwrap(),
            AspectRatio::Vertical
        );
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }
}
