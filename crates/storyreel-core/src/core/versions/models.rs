//! Scene and Version Models

use serde::{Deserialize, Serialize};
use specta::Type;

use crate::core::{new_id, unix_now, ActorId, AspectRatio, MediaRef, SceneId, ShotId, VersionId};

/// How a version came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub enum VersionKind {
    /// Saved from the live draft
    DraftSnapshot,
    /// Promoted from the live draft by a completed generation
    Generated,
}

/// Media attached to a version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct VersionAssets {
    #[serde(default)]
    pub preview_frames: Vec<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaRef>,
}

/// Immutable prompt snapshot. Only `assets` may change, and only by
/// replacing the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: VersionId,
    pub kind: VersionKind,
    pub prompt: String,
    #[serde(default)]
    pub assets: VersionAssets,
    pub created_at: i64,
}

impl Version {
    pub fn new(kind: VersionKind, prompt: impl Into<String>, assets: VersionAssets) -> Self {
        Self {
            id: new_id(),
            kind,
            prompt: prompt.into(),
            assets,
            created_at: unix_now(),
        }
    }

    /// Copy of this version with a video attached
    pub fn with_video(&self, video: MediaRef) -> Self {
        Self {
            assets: VersionAssets {
                video: Some(video),
                ..self.assets.clone()
            },
            ..self.clone()
        }
    }
}

/// Scene's active pointer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(tag = "state", content = "versionId", rename_all = "camelCase")]
pub enum ActiveVersion {
    /// The editable live draft
    #[default]
    Live,
    /// A saved version
    Version(VersionId),
}

/// Navigation direction across `[Live, v1, ..., vn]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Forward,
    Backward,
}

/// A compiled selection of shots with its version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    /// Ordered, non-empty
    pub shot_ids: Vec<ShotId>,
    /// Union of the shots' main cast
    #[serde(default)]
    pub cast_ids: Vec<ActorId>,
    #[serde(default)]
    pub global_style: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub active: ActiveVersion,
    #[serde(default)]
    pub draft_prompt: String,
    /// Set by manual draft edits; suppresses recompilation
    #[serde(default)]
    pub manual_override: bool,
    /// Latest generated still of each shot, in shot order
    #[serde(default)]
    pub preview_frames: Vec<MediaRef>,
    pub created_at: i64,
}

impl Scene {
    pub fn version(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The active saved version, if the pointer is not on the live draft
    pub fn active_version(&self) -> Option<&Version> {
        match &self.active {
            ActiveVersion::Live => None,
            ActiveVersion::Version(id) => self.version(id),
        }
    }

    /// Prompt of whatever the active pointer designates
    pub fn active_prompt(&self) -> &str {
        self.active_version()
            .map(|version| version.prompt.as_str())
            .unwrap_or(&self.draft_prompt)
    }

    /// Preview frames of whatever the active pointer designates
    pub fn active_preview_frames(&self) -> &[MediaRef] {
        self.active_version()
            .map(|version| version.assets.preview_frames.as_slice())
            .unwrap_or(&self.preview_frames)
    }

    /// Position in the navigation cycle: 0 for live, `i + 1` for `versions[i]`
    pub fn cycle_position(&self) -> usize {
        match &self.active {
            ActiveVersion::Live => 0,
            ActiveVersion::Version(id) => self
                .versions
                .iter()
                .position(|v| &v.id == id)
                .map(|i| i + 1)
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_video_keeps_identity() {
        let version = Version::new(VersionKind::DraftSnapshot, "prompt", VersionAssets::default());
        let updated = version.with_video("https://v/1.mp4".to_string());
        assert_eq!(updated.id, version.id);
        assert_eq!(updated.prompt, version.prompt);
        assert_eq!(updated.created_at, version.created_at);
        assert_eq!(updated.assets.video.as_deref(), Some("https://v/1.mp4"));
        assert!(version.assets.video.is_none());
    }

    #[test]
    fn test_active_serialization() {
        let json = serde_json::to_value(ActiveVersion::Version("v1".into())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "version", "versionId": "v1"}));
        let live: ActiveVersion = serde_json::from_value(serde_json::json!({"state": "live"})).unwrap();
        assert_eq!(live, ActiveVersion::Live);
    }
}
