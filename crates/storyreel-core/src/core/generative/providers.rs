//! Generative AI Providers
//!
//! Provider abstraction shared by the HTTP adapter and the test mock.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::analysis::AnalysisParams;
use super::audio::{SoundEffectParams, SpeechParams};
use super::error::GenerationError;
use super::image::ImageParams;
use super::video::{VideoParams, VideoResult};
use crate::core::MediaRef;

/// Wire dialect family, chosen once at configuration time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderFamily {
    /// `generateContent` with combined content parts
    #[default]
    Native,
    /// `chat/completions` with typed message blocks
    ChatStyle,
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderFamily::Native => write!(f, "native"),
            ProviderFamily::ChatStyle => write!(f, "chatStyle"),
        }
    }
}

/// Generation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderKind {
    Analysis,
    Image,
    Speech,
    SoundEffect,
    Video,
}

impl ProviderKind {
    pub fn all() -> [ProviderKind; 5] {
        [
            ProviderKind::Analysis,
            ProviderKind::Image,
            ProviderKind::Speech,
            ProviderKind::SoundEffect,
            ProviderKind::Video,
        ]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Analysis => write!(f, "Analysis"),
            ProviderKind::Image => write!(f, "Image"),
            ProviderKind::Speech => write!(f, "Speech"),
            ProviderKind::SoundEffect => write!(f, "Sound Effect"),
            ProviderKind::Video => write!(f, "Video"),
        }
    }
}

/// A provider-agnostic generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationRequest {
    Analysis(AnalysisParams),
    Image(ImageParams),
    Speech(SpeechParams),
    SoundEffect(SoundEffectParams),
    Video(VideoParams),
}

impl GenerationRequest {
    pub fn kind(&self) -> ProviderKind {
        match self {
            GenerationRequest::Analysis(_) => ProviderKind::Analysis,
            GenerationRequest::Image(_) => ProviderKind::Image,
            GenerationRequest::Speech(_) => ProviderKind::Speech,
            GenerationRequest::SoundEffect(_) => ProviderKind::SoundEffect,
            GenerationRequest::Video(_) => ProviderKind::Video,
        }
    }

    /// Checks parameters before any network I/O
    pub fn validate(&self) -> Result<(), GenerationError> {
        let result = match self {
            GenerationRequest::Analysis(params) => params.validate(),
            GenerationRequest::Image(params) => params.validate(),
            GenerationRequest::Speech(params) => params.validate(),
            GenerationRequest::SoundEffect(params) => params.validate(),
            GenerationRequest::Video(params) => params.validate(),
        };
        result.map_err(GenerationError::InvalidRequest)
    }
}

/// Output of a generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationOutput {
    /// Raw analysis text
    Text { text: String },
    /// Image or audio handle
    Media { media: MediaRef },
    /// Finished video
    Video(VideoResult),
}

impl GenerationOutput {
    pub fn text(text: impl Into<String>) -> Self {
        GenerationOutput::Text { text: text.into() }
    }

    pub fn media(media: impl Into<MediaRef>) -> Self {
        GenerationOutput::Media {
            media: media.into(),
        }
    }

    pub fn into_text(self) -> Result<String, GenerationError> {
        match self {
            GenerationOutput::Text { text } => Ok(text),
            other => Err(unexpected("text", &other)),
        }
    }

    pub fn into_media(self) -> Result<MediaRef, GenerationError> {
        match self {
            GenerationOutput::Media { media } => Ok(media),
            other => Err(unexpected("media", &other)),
        }
    }

    pub fn into_video(self) -> Result<VideoResult, GenerationError> {
        match self {
            GenerationOutput::Video(result) => Ok(result),
            other => Err(unexpected("video", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &GenerationOutput) -> GenerationError {
    GenerationError::EmptyResponse(format!("expected {} output, got {:?}", expected, got))
}

/// Trait for generation backends
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Returns the provider name
    fn name(&self) -> &str;

    /// Executes one request
    async fn submit(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError>;

    /// Runs a text analysis request
    async fn analyze(&self, params: AnalysisParams) -> Result<String, GenerationError> {
        self.submit(GenerationRequest::Analysis(params))
            .await?
            .into_text()
    }

    /// Generates a still image
    async fn generate_image(&self, params: ImageParams) -> Result<MediaRef, GenerationError> {
        self.submit(GenerationRequest::Image(params))
            .await?
            .into_media()
    }

    /// Generates speech
    async fn generate_speech(&self, params: SpeechParams) -> Result<MediaRef, GenerationError> {
        self.submit(GenerationRequest::Speech(params))
            .await?
            .into_media()
    }

    /// Generates a sound effect
    async fn generate_sound_effect(
        &self,
        params: SoundEffectParams,
    ) -> Result<MediaRef, GenerationError> {
        self.submit(GenerationRequest::SoundEffect(params))
            .await?
            .into_media()
    }

    /// Generates a video, resolving once the provider job has finished
    async fn generate_video(&self, params: VideoParams) -> Result<VideoResult, GenerationError> {
        self.submit(GenerationRequest::Video(params))
            .await?
            .into_video()
    }
}

// ============================================================================
// Mock Provider for Testing
// ============================================================================

type Scripted = Result<GenerationOutput, GenerationError>;

/// Mock provider recording every request.
///
/// Scripted responses are consumed per kind in FIFO order; once a queue is
/// empty a canned success is returned.
#[derive(Debug, Default)]
pub struct MockGenerativeProvider {
    requests: Mutex<Vec<GenerationRequest>>,
    scripted: Mutex<HashMap<ProviderKind, VecDeque<Scripted>>>,
    delay: Option<Duration>,
}

impl MockGenerativeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response, for exercising overlapping calls
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a response for the given kind
    pub fn push_response(&self, kind: ProviderKind, response: Scripted) {
        self.scripted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(kind)
            .or_default()
            .push_back(response);
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn canned(request: &GenerationRequest, sequence: usize) -> GenerationOutput {
        match request {
            GenerationRequest::Analysis(_) => GenerationOutput::text("[]"),
            GenerationRequest::Image(_) => {
                GenerationOutput::media(format!("https://mock.storyreel.local/image/{}.png", sequence))
            }
            GenerationRequest::Speech(_) | GenerationRequest::SoundEffect(_) => {
                GenerationOutput::media(format!("https://mock.storyreel.local/audio/{}.mp3", sequence))
            }
            GenerationRequest::Video(_) => GenerationOutput::Video(VideoResult {
                video: format!("https://mock.storyreel.local/video/{}.mp4", sequence),
                task_id: Some(format!("mock-task-{}", sequence)),
                poll_count: 1,
            }),
        }
    }
}

#[async_trait]
impl GenerativeProvider for MockGenerativeProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        request.validate()?;

        let kind = request.kind();
        let sequence = {
            let mut requests = self
                .requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            requests.push(request.clone());
            requests.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(response) => response,
            None => Ok(Self::canned(&request, sequence)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
