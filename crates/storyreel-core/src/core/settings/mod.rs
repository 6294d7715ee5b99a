//! Settings Persistence System
//!
//! Provider endpoints, request policy and storyboard defaults, with:
//! - Atomic file writes (temp file + rename)
//! - Defaults for every missing field
//! - Clamping normalization instead of validation failures
//!
//! Storage location: {config_dir}/storyreel/settings.json

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::fs::{atomic_write_json_pretty, read_to_string_if_exists};
use crate::core::generative::{ProviderFamily, ProviderKind};
use crate::core::{AspectRatio, CoreResult};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Studio settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudioSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Provider endpoints and request policy
    #[serde(default)]
    pub providers: ProviderSettings,

    /// Defaults applied to new scenes
    #[serde(default)]
    pub defaults: StoryboardDefaults,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            providers: ProviderSettings::default(),
            defaults: StoryboardDefaults::default(),
        }
    }
}

impl StudioSettings {
    /// Clamp out-of-range values back into supported ranges.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;
        self.providers.normalize();
        self.defaults.global_style = self.defaults.global_style.trim().to_string();
    }
}

// =============================================================================
// Provider Settings
// =============================================================================

/// Connection details for one generation kind
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSettings {
    /// Base URL, e.g. `https://api.example.com/v1`
    #[serde(default)]
    pub base_url: String,

    /// API key sent with every request
    #[serde(default)]
    pub api_key: String,

    /// Model identifier (provider-specific)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl EndpointSettings {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Base URL without trailing slashes
    pub fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// Both base URL and API key are present
    pub fn is_configured(&self) -> bool {
        !self.base().is_empty() && !self.api_key.trim().is_empty()
    }

    fn normalize(&mut self) {
        self.base_url = self.base().to_string();
        self.api_key = self.api_key.trim().to_string();
        if self
            .model
            .as_deref()
            .is_some_and(|model| model.trim().is_empty())
        {
            self.model = None;
        }
    }
}

/// Video job polling policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollPolicy {
    /// Delay before each status check
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Status checks allowed before giving up
    #[serde(default = "default_poll_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_poll_max_attempts() -> u32 {
    120
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_attempts: default_poll_max_attempts(),
        }
    }
}

impl PollPolicy {
    pub fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Reference image compression policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSettings {
    /// Inline images larger than this are compressed before submission
    #[serde(default = "default_threshold_bytes")]
    pub threshold_bytes: usize,

    /// Longest edge after compression
    #[serde(default = "default_max_edge")]
    pub max_edge: u32,

    /// Time budget for one compression
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
}

fn default_threshold_bytes() -> usize {
    1024 * 1024
}

fn default_max_edge() -> u32 {
    1536
}

fn default_budget_ms() -> u64 {
    3_000
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            threshold_bytes: default_threshold_bytes(),
            max_edge: default_max_edge(),
            budget_ms: default_budget_ms(),
        }
    }
}

impl CompressionSettings {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

/// Provider configuration for every generation kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Wire dialect for analysis and image requests
    #[serde(default)]
    pub family: ProviderFamily,

    #[serde(default)]
    pub analysis: EndpointSettings,

    #[serde(default)]
    pub image: EndpointSettings,

    #[serde(default)]
    pub speech: EndpointSettings,

    #[serde(default)]
    pub sound_effect: EndpointSettings,

    #[serde(default)]
    pub video: EndpointSettings,

    /// Abort timeout applied to every HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub poll: PollPolicy,

    #[serde(default)]
    pub compression: CompressionSettings,
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            family: ProviderFamily::default(),
            analysis: EndpointSettings::default(),
            image: EndpointSettings::default(),
            speech: EndpointSettings::default(),
            sound_effect: EndpointSettings::default(),
            video: EndpointSettings::default(),
            request_timeout_secs: default_request_timeout_secs(),
            poll: PollPolicy::default(),
            compression: CompressionSettings::default(),
        }
    }
}

impl ProviderSettings {
    /// Endpoint configured for a generation kind
    pub fn endpoint(&self, kind: ProviderKind) -> &EndpointSettings {
        match kind {
            ProviderKind::Analysis => &self.analysis,
            ProviderKind::Image => &self.image,
            ProviderKind::Speech => &self.speech,
            ProviderKind::SoundEffect => &self.sound_effect,
            ProviderKind::Video => &self.video,
        }
    }

    pub fn endpoint_mut(&mut self, kind: ProviderKind) -> &mut EndpointSettings {
        match kind {
            ProviderKind::Analysis => &mut self.analysis,
            ProviderKind::Image => &mut self.image,
            ProviderKind::Speech => &mut self.speech,
            ProviderKind::SoundEffect => &mut self.sound_effect,
            ProviderKind::Video => &mut self.video,
        }
    }

    /// Points every kind at the same endpoint
    pub fn with_shared_endpoint(mut self, endpoint: EndpointSettings) -> Self {
        for kind in ProviderKind::all() {
            *self.endpoint_mut(kind) = endpoint.clone();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn normalize(&mut self) {
        // Request timeout: 5s - 30min
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        self.request_timeout_secs = self.request_timeout_secs.clamp(5, 1800);

        // Poll interval: 100ms - 60s
        if self.poll.interval_ms == 0 {
            self.poll.interval_ms = default_poll_interval_ms();
        }
        self.poll.interval_ms = self.poll.interval_ms.clamp(100, 60_000);
        self.poll.max_attempts = self.poll.max_attempts.clamp(1, 10_000);

        if self.compression.threshold_bytes == 0 {
            self.compression.threshold_bytes = default_threshold_bytes();
        }
        self.compression.max_edge = self.compression.max_edge.clamp(64, 8192);
        self.compression.budget_ms = self.compression.budget_ms.clamp(100, 60_000);

        for kind in ProviderKind::all() {
            self.endpoint_mut(kind).normalize();
        }
    }
}

// =============================================================================
// Storyboard Defaults
// =============================================================================

/// Defaults applied when a storyboard or scene does not specify its own
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardDefaults {
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    #[serde(default)]
    pub global_style: String,
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Loads and saves [`StudioSettings`] in a settings directory
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager for the given directory
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            settings_path: dir.as_ref().join(SETTINGS_FILE),
        }
    }

    /// Manager rooted at `{config_dir}/storyreel`, if the platform has one
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join("storyreel")))
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    /// Loads settings, falling back to defaults on a missing or corrupt file
    pub fn load(&self) -> StudioSettings {
        match self.try_load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                StudioSettings::default()
            }
        }
    }

    fn try_load(&self) -> CoreResult<StudioSettings> {
        let Some(content) = read_to_string_if_exists(&self.settings_path)? else {
            info!("Settings file not found, using defaults");
            return Ok(StudioSettings::default());
        };

        let mut settings = serde_json::from_str::<StudioSettings>(&content)?;
        if settings.version < SETTINGS_VERSION {
            info!(
                "Migrating settings from version {} to {}",
                settings.version, SETTINGS_VERSION
            );
        }
        settings.normalize();
        Ok(settings)
    }

    /// Normalizes and persists settings, returning what was written
    pub fn save(&self, settings: &StudioSettings) -> CoreResult<StudioSettings> {
        let mut normalized = settings.clone();
        normalized.normalize();
        atomic_write_json_pretty(&self.settings_path, &normalized)?;
        info!("Settings saved to {}", self.settings_path.display());
        Ok(normalized)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = StudioSettings::default();
        assert_eq!(settings.providers.request_timeout_secs, 300);
        assert_eq!(settings.providers.poll.interval_ms, 5000);
        assert_eq!(settings.providers.poll.max_attempts, 120);
        assert_eq!(settings.providers.compression.threshold_bytes, 1024 * 1024);
        assert_eq!(settings.providers.compression.max_edge, 1536);
        assert_eq!(settings.providers.family, ProviderFamily::Native);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"providers":{"family":"chatStyle","video":{"baseUrl":"https://v/"}}}"#;
        let settings: StudioSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.providers.family, ProviderFamily::ChatStyle);
        assert_eq!(settings.providers.video.base_url, "https://v/");
        assert_eq!(settings.providers.poll, PollPolicy::default());
        assert_eq!(settings.version, SETTINGS_VERSION);
    }

    #[test]
    fn test_normalize_clamps() {
        let mut settings = StudioSettings::default();
        settings.providers.request_timeout_secs = 1;
        settings.providers.poll.interval_ms = 0;
        settings.providers.poll.max_attempts = 0;
        settings.providers.compression.max_edge = 1;
        settings.providers.image = EndpointSettings::new(" https://img.example.com/v1/ ", " key ")
            .with_model("  ");
        settings.normalize();

        assert_eq!(settings.providers.request_timeout_secs, 5);
        assert_eq!(settings.providers.poll.interval_ms, 5000);
        assert_eq!(settings.providers.poll.max_attempts, 1);
        assert_eq!(settings.providers.compression.max_edge, 64);
        assert_eq!(settings.providers.image.base_url, "https://img.example.com/v1");
        assert_eq!(settings.providers.image.api_key, "key");
        assert!(settings.providers.image.model.is_none());
    }

    #[test]
    fn test_endpoint_configured() {
        assert!(!EndpointSettings::default().is_configured());
        assert!(!EndpointSettings::new("https://x", "  ").is_configured());
        assert!(EndpointSettings::new("https://x", "k").is_configured());
    }

    #[test]
    fn test_shared_endpoint() {
        let providers =
            ProviderSettings::default().with_shared_endpoint(EndpointSettings::new("https://x", "k"));
        for kind in ProviderKind::all() {
            assert!(providers.endpoint(kind).is_configured());
        }
    }

    #[test]
    fn test_manager_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path());

        assert_eq!(manager.load(), StudioSettings::default());

        let mut settings = StudioSettings::default();
        settings.defaults.aspect_ratio = AspectRatio::Widescreen;
        settings.defaults.global_style = "Cinematic".to_string();
        settings.providers.poll = PollPolicy::new(250, 10);
        let saved = manager.save(&settings).unwrap();

        let loaded = manager.load();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.defaults.aspect_ratio, AspectRatio::Widescreen);
        assert_eq!(loaded.providers.poll.interval_ms, 250);
    }

    #[test]
    fn test_manager_corrupt_file_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        let manager = SettingsManager::new(dir.path());
        assert_eq!(manager.load(), StudioSettings::default());
    }
}
