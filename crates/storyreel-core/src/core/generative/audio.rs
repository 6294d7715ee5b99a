//! Audio Generation
//!
//! Parameters for dialogue speech and sound effects.

use serde::{Deserialize, Serialize};
use specta::Type;

/// Speech voice presets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    /// Returns all available voices
    pub fn all() -> [Voice; 6] {
        [
            Voice::Alloy,
            Voice::Echo,
            Voice::Fable,
            Voice::Onyx,
            Voice::Nova,
            Voice::Shimmer,
        ]
    }

    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Onyx => "onyx",
            Voice::Nova => "nova",
            Voice::Shimmer => "shimmer",
        }
    }

    /// Case-insensitive lookup
    pub fn parse(value: &str) -> Option<Voice> {
        let value = value.trim();
        Voice::all()
            .into_iter()
            .find(|voice| voice.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for text-to-speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechParams {
    /// Text to speak
    pub text: String,
    pub voice: Voice,
    /// Speaking speed (0.5 - 2.0, 1.0 is normal)
    pub speed: f32,
}

impl SpeechParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: Voice::default(),
            speed: 1.0,
        }
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }

    /// Sets the speaking speed
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = if speed.is_finite() {
            speed.clamp(0.5, 2.0)
        } else {
            1.0
        };
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("Speech text cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Shortest sound effect requested from providers
pub const MIN_SFX_SECONDS: f32 = 0.5;

/// Longest sound effect requested from providers
pub const MAX_SFX_SECONDS: f32 = 30.0;

/// Parameters for sound-effect generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundEffectParams {
    pub description: String,
    /// Length in seconds (0.5 - 30)
    pub duration_seconds: f32,
}

impl SoundEffectParams {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            duration_seconds: 5.0,
        }
    }

    /// Sets the duration, clamped to the provider range
    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration_seconds = if seconds.is_finite() {
            seconds.clamp(MIN_SFX_SECONDS, MAX_SFX_SECONDS)
        } else {
            5.0
        };
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("Sound effect description cannot be empty".to_string());
        }
        Ok(())
    }
}
