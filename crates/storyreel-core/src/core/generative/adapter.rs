//! Provider Adapter
//!
//! HTTP implementation of [`GenerativeProvider`]. Analysis and image requests
//! go through the configured [`WireDialect`]; speech, sound effects and video
//! use common bearer-authenticated REST endpoints.
//!
//! Video follows a submit + poll model. The submit response is first probed
//! for a finished video URL; otherwise its task id is polled until the job
//! succeeds, fails or the poll ceiling is reached. Job state never outlives
//! the call. There is no automatic retry at this layer.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::analysis::AnalysisParams;
use super::audio::{SoundEffectParams, SpeechParams};
use super::error::GenerationError;
use super::image::ImageParams;
use super::media::{ImagePayload, MediaResolver};
use super::provider_impls::{dialect_for, WireDialect, WireRequest};
use super::providers::{GenerationOutput, GenerationRequest, GenerativeProvider, ProviderKind};
use super::shapes::{self, ImageHit};
use super::video::{JobStatus, VideoJob, VideoParams, VideoResult};
use crate::core::assets::{blob_ref, decode_base64};
use crate::core::settings::{EndpointSettings, ProviderSettings};
use crate::core::storage::BlobStore;
use crate::core::MediaRef;

/// Default speech model
pub const DEFAULT_SPEECH_MODEL: &str = "tts-1";

// =============================================================================
// Common REST Request Types
// =============================================================================

#[derive(Debug, Serialize)]
struct SpeechRequest {
    model: String,
    input: String,
    voice: String,
    speed: f32,
    response_format: &'static str,
}

#[derive(Debug, Serialize)]
struct SoundEffectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    text: String,
    duration_seconds: f32,
}

#[derive(Debug, Serialize)]
struct SubmitVideoRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    prompt: String,
    duration: u32,
    aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

// =============================================================================
// ProviderAdapter
// =============================================================================

/// Multi-kind generation adapter over heterogeneous HTTP APIs
pub struct ProviderAdapter {
    /// HTTP client with the configured abort timeout
    client: reqwest::Client,
    settings: ProviderSettings,
    dialect: Box<dyn WireDialect>,
    media: MediaResolver,
    blobs: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("family", &self.settings.family)
            .field("request_timeout_secs", &self.settings.request_timeout_secs)
            .field("poll", &self.settings.poll)
            .finish_non_exhaustive()
    }
}

impl ProviderAdapter {
    /// Creates an adapter. The dialect is fixed by `settings.family`.
    pub fn new(settings: ProviderSettings, blobs: Arc<dyn BlobStore>) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| GenerationError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            dialect: dialect_for(settings.family),
            media: MediaResolver::new(blobs.clone(), settings.compression),
            blobs,
            settings,
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Endpoint for a kind, rejecting incomplete configuration
    fn endpoint(&self, kind: ProviderKind) -> Result<&EndpointSettings, GenerationError> {
        let endpoint = self.settings.endpoint(kind);
        if endpoint.base().is_empty() {
            return Err(GenerationError::Configuration(format!(
                "{} base URL is not set",
                kind
            )));
        }
        if endpoint.api_key.trim().is_empty() {
            return Err(GenerationError::Configuration(format!(
                "{} API key is not set",
                kind
            )));
        }
        Ok(endpoint)
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Sends a POST, mapping transport failures and non-success statuses
    async fn post(&self, request: WireRequest) -> Result<reqwest::Response, GenerationError> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| GenerationError::transport(&e))?;
        Self::check_status(response).await
    }

    async fn get(&self, url: &str, api_key: &str) -> Result<reqwest::Response, GenerationError> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|e| GenerationError::transport(&e))?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GenerationError::Provider {
            status: status.as_u16(),
            message: shapes::extract_error_message(&body),
        })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, GenerationError> {
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::transport(&e))?;
        serde_json::from_str(&body).map_err(|e| {
            GenerationError::EmptyResponse(format!(
                "response is not JSON ({}): {}",
                e,
                body.chars().take(shapes::ERROR_BODY_PREVIEW_CHARS).collect::<String>()
            ))
        })
    }

    /// Stores a base64 payload in the blob registry
    async fn store_base64(&self, mime_type: &str, data: &str) -> Result<MediaRef, GenerationError> {
        let bytes = decode_base64(data)
            .ok_or_else(|| GenerationError::EmptyResponse("payload is not valid base64".to_string()))?;
        self.store_bytes(bytes, mime_type).await
    }

    async fn store_bytes(&self, bytes: Vec<u8>, mime_type: &str) -> Result<MediaRef, GenerationError> {
        if bytes.is_empty() {
            return Err(GenerationError::EmptyResponse("empty media body".to_string()));
        }
        let handle = self
            .blobs
            .put(bytes, mime_type)
            .await
            .map_err(|e| GenerationError::EmptyResponse(format!("failed to store media: {}", e)))?;
        Ok(blob_ref(&handle))
    }

    // =========================================================================
    // Analysis & Image
    // =========================================================================

    async fn run_analysis(&self, params: &AnalysisParams) -> Result<String, GenerationError> {
        let endpoint = self.endpoint(ProviderKind::Analysis)?;
        let images = self.media.resolve_all(&params.images).await;
        if images.len() < params.images.len() {
            warn!(
                "Analysis: {} of {} images could not be resolved and were skipped",
                params.images.len() - images.len(),
                params.images.len()
            );
        }

        let request = self.dialect.analysis_request(endpoint, params, &images);
        let body = Self::read_json(self.post(request).await?).await?;
        self.dialect
            .parse_text(&body)
            .ok_or_else(|| GenerationError::EmptyResponse("no text in analysis response".to_string()))
    }

    async fn run_image(&self, params: &ImageParams) -> Result<MediaRef, GenerationError> {
        let endpoint = self.endpoint(ProviderKind::Image)?;

        let references: Vec<ImagePayload> = if params.use_conditioning {
            let resolved = self.media.resolve_all(params.references()).await;
            if resolved.is_empty() {
                warn!("Image conditioning requested but no reference resolved; generating from text only");
            }
            resolved
        } else {
            Vec::new()
        };

        let request = self.dialect.image_request(endpoint, params, &references);
        let body = Self::read_json(self.post(request).await?).await?;
        match self.dialect.parse_image(&body) {
            Some(ImageHit::Url(url)) => Ok(url),
            Some(ImageHit::Base64 { mime_type, data }) => self.store_base64(&mime_type, &data).await,
            None => Err(GenerationError::EmptyResponse(
                "no image in provider response".to_string(),
            )),
        }
    }

    // =========================================================================
    // Audio
    // =========================================================================

    async fn run_speech(&self, params: &SpeechParams) -> Result<MediaRef, GenerationError> {
        let endpoint = self.endpoint(ProviderKind::Speech)?;
        let body = SpeechRequest {
            model: endpoint
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            input: params.text.clone(),
            voice: params.voice.as_str().to_string(),
            speed: params.speed,
            response_format: "mp3",
        };
        let request = WireRequest::bearer(
            format!("{}/audio/speech", endpoint.base()),
            &endpoint.api_key,
            serde_json::to_value(body).unwrap_or_default(),
        );
        self.read_audio(self.post(request).await?).await
    }

    async fn run_sound_effect(&self, params: &SoundEffectParams) -> Result<MediaRef, GenerationError> {
        let endpoint = self.endpoint(ProviderKind::SoundEffect)?;
        let body = SoundEffectRequest {
            model: endpoint.model.clone(),
            text: params.description.clone(),
            duration_seconds: params.duration_seconds,
        };
        let request = WireRequest::bearer(
            format!("{}/sound-generation", endpoint.base()),
            &endpoint.api_key,
            serde_json::to_value(body).unwrap_or_default(),
        );
        self.read_audio(self.post(request).await?).await
    }

    /// Binary bodies go to the blob registry; JSON bodies are probed
    async fn read_audio(&self, response: reqwest::Response) -> Result<MediaRef, GenerationError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .unwrap_or_default();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::transport(&e))?
            .to_vec();

        if content_type.contains("json") {
            let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
                GenerationError::EmptyResponse(format!("audio response is not JSON: {}", e))
            })?;
            return match shapes::probe_audio(&body) {
                Some(ImageHit::Url(url)) => Ok(url),
                Some(ImageHit::Base64 { mime_type, data }) => self.store_base64(&mime_type, &data).await,
                None => Err(GenerationError::EmptyResponse(
                    "no audio in provider response".to_string(),
                )),
            };
        }

        let mime_type = if content_type.is_empty() || content_type == "application/octet-stream" {
            "audio/mpeg".to_string()
        } else {
            content_type
        };
        self.store_bytes(bytes, &mime_type).await
    }

    // =========================================================================
    // Video
    // =========================================================================

    fn submit_url(endpoint: &EndpointSettings) -> String {
        format!("{}/video/generations", endpoint.base())
    }

    fn poll_url(endpoint: &EndpointSettings, task_id: &str) -> String {
        format!("{}/video/generations/{}", endpoint.base(), task_id)
    }

    async fn run_video(&self, params: &VideoParams) -> Result<VideoResult, GenerationError> {
        let endpoint = self.endpoint(ProviderKind::Video)?;

        let image = match &params.start_frame {
            Some(frame) => {
                let resolved = self.media.resolve(frame).await;
                if resolved.is_none() {
                    warn!("Video start frame could not be resolved; submitting without it");
                }
                resolved.map(|payload| payload.to_url())
            }
            None => None,
        };

        let body = SubmitVideoRequest {
            model: endpoint.model.clone(),
            prompt: params.prompt.clone(),
            duration: params.duration_seconds,
            aspect_ratio: params.aspect_ratio.as_str().to_string(),
            image,
        };
        let request = WireRequest::bearer(
            Self::submit_url(endpoint),
            &endpoint.api_key,
            serde_json::to_value(body).unwrap_or_default(),
        );
        let submitted = Self::read_json(self.post(request).await?).await?;

        if let Some(video) = shapes::probe_video_url(&submitted) {
            info!("Video generation returned inline result");
            return Ok(VideoResult {
                video,
                task_id: shapes::probe_task_id(&submitted),
                poll_count: 0,
            });
        }

        let task_id = shapes::probe_task_id(&submitted).ok_or_else(|| {
            GenerationError::EmptyResponse("submit response has neither a video URL nor a task id".to_string())
        })?;
        info!("Video generation submitted: task_id={}", task_id);

        self.poll_job(endpoint, VideoJob::new(task_id)).await
    }

    /// Polls until success, failure or the attempt ceiling
    async fn poll_job(
        &self,
        endpoint: &EndpointSettings,
        mut job: VideoJob,
    ) -> Result<VideoResult, GenerationError> {
        let policy = self.settings.poll;
        let url = Self::poll_url(endpoint, &job.task_id);

        while job.poll_count < policy.max_attempts {
            tokio::time::sleep(policy.interval()).await;
            job.poll_count += 1;

            let body = Self::read_json(self.get(&url, &endpoint.api_key).await?).await?;
            let status = shapes::probe_status(&body);
            let video = shapes::probe_video_url(&body);
            job.status = match (&status, &video) {
                (Some(status), _) => JobStatus::from_provider(status),
                (None, Some(_)) => JobStatus::Succeeded,
                (None, None) => JobStatus::Pending,
            };

            debug!(
                "Video poll {}/{} for task {}: status={:?}",
                job.poll_count, policy.max_attempts, job.task_id, status
            );

            match job.status {
                JobStatus::Pending => continue,
                JobStatus::Succeeded => {
                    let video = video.ok_or_else(|| {
                        GenerationError::EmptyResponse(format!(
                            "task {} succeeded without a video URL",
                            job.task_id
                        ))
                    })?;
                    info!(
                        "Video generation completed: task_id={} after {} polls",
                        job.task_id, job.poll_count
                    );
                    return Ok(VideoResult {
                        video,
                        task_id: Some(job.task_id),
                        poll_count: job.poll_count,
                    });
                }
                JobStatus::Failed => {
                    return Err(GenerationError::Provider {
                        status: reqwest::StatusCode::OK.as_u16(),
                        message: shapes::extract_error_message(&body.to_string()),
                    });
                }
            }
        }

        warn!(
            "Video task {} still pending after {} polls",
            job.task_id, job.poll_count
        );
        Err(GenerationError::PollTimeout {
            attempts: job.poll_count,
        })
    }
}

#[async_trait]
impl GenerativeProvider for ProviderAdapter {
    fn name(&self) -> &str {
        match self.dialect.family() {
            super::ProviderFamily::Native => "native",
            super::ProviderFamily::ChatStyle => "chatStyle",
        }
    }

    async fn submit(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        request.validate()?;
        let kind = request.kind();
        info!("Submitting {} request via {} dialect", kind, self.name());

        let output = match &request {
            GenerationRequest::Analysis(params) => self.run_analysis(params).await.map(GenerationOutput::text),
            GenerationRequest::Image(params) => self.run_image(params).await.map(GenerationOutput::media),
            GenerationRequest::Speech(params) => self.run_speech(params).await.map(GenerationOutput::media),
            GenerationRequest::SoundEffect(params) => {
                self.run_sound_effect(params).await.map(GenerationOutput::media)
            }
            GenerationRequest::Video(params) => self.run_video(params).await.map(GenerationOutput::Video),
        };

        match &output {
            Ok(_) => info!("{} request completed", kind),
            Err(e) => warn!("{} request failed: {}", kind, e),
        }
        output
    }
}
