//! Studio
//!
//! Wires the storyboard store, a generative provider and the version ledger
//! into the operations a presentation layer drives.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::analysis::{self, PatchSummary};
use crate::core::generative::{
    GenerativeProvider, ImageParams, ProviderAdapter, SoundEffectParams, SpeechParams, Voice,
    DEFAULT_STRENGTH,
};
use crate::core::prompt::parse_duration;
use crate::core::settings::ProviderSettings;
use crate::core::storage::{BlobStore, KeyValueStore};
use crate::core::storyboard::{
    select_references, AudioNote, GeneratedImage, ReferenceSet, Shot, Storyboard, StoryboardStore,
};
use crate::core::versions;
use crate::core::{CoreError, CoreResult, MediaRef, SceneId, ShotId, VersionId};

// =============================================================================
// Studio
// =============================================================================

/// Entry point for generation workflows.
///
/// Calls hold no lock while a provider request is in flight, so several
/// generations may overlap; each result is committed as a whole-value update.
#[derive(Clone)]
pub struct Studio {
    store: Arc<StoryboardStore>,
    provider: Arc<dyn GenerativeProvider>,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("store", &self.store)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Studio {
    pub fn new(store: Arc<StoryboardStore>, provider: Arc<dyn GenerativeProvider>) -> Self {
        Self { store, provider }
    }

    /// Opens the persisted storyboard and builds an HTTP adapter from settings
    pub async fn open(
        settings: ProviderSettings,
        persistence: Arc<dyn KeyValueStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> CoreResult<Self> {
        let adapter = ProviderAdapter::new(settings, blobs)?;
        let store = StoryboardStore::open(persistence).await;
        Ok(Self::new(Arc::new(store), Arc::new(adapter)))
    }

    pub fn store(&self) -> &Arc<StoryboardStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn GenerativeProvider> {
        &self.provider
    }

    pub async fn snapshot(&self) -> Arc<Storyboard> {
        self.store.snapshot().await
    }

    fn shot(board: &Storyboard, shot_id: &str) -> CoreResult<Shot> {
        board
            .shot(shot_id)
            .cloned()
            .ok_or_else(|| CoreError::ShotNotFound(shot_id.to_string()))
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Analyzes a script and appends the resulting shots
    pub async fn analyze_script(&self, script: &str, images: &[MediaRef]) -> CoreResult<Vec<ShotId>> {
        let shots = analysis::analyze_script(self.provider.as_ref(), script, images).await?;
        self.store
            .update(|board| Ok(analysis::append_shots(board, shots)))
            .await
    }

    /// Applies chat-style patches; nothing is applied if any patch fails
    pub async fn apply_shot_patches(&self, text: &str) -> CoreResult<PatchSummary> {
        let patches = analysis::parse_shot_patches(text)?;
        self.store
            .update(|board| analysis::apply_shot_patches(board, patches))
            .await
    }

    // =========================================================================
    // Shot media
    // =========================================================================

    /// Generates a still for a shot and appends it to the shot's history
    pub async fn generate_shot_image(&self, shot_id: &str) -> CoreResult<GeneratedImage> {
        let board = self.store.snapshot().await;
        let shot = Self::shot(&board, shot_id)?;

        let references = ReferenceSet::split(select_references(
            &shot,
            &board.actors,
            board.anchor.as_ref(),
        ));

        let prompt = shot_image_prompt(&shot, &board.global_style);
        let mut params = ImageParams::new(prompt.clone()).with_aspect_ratio(board.aspect_ratio.as_str());
        if !references.is_empty() {
            params = params
                .with_references(references.primary, references.secondary)
                .with_strength(DEFAULT_STRENGTH);
        }

        info!(
            "Generating image for shot {} ({} references)",
            shot_id,
            params.references().count()
        );
        let media = self.provider.generate_image(params).await?;

        let image = GeneratedImage::new(media, prompt);
        self.store.append_shot_image(shot_id, image.clone()).await?;
        Ok(image)
    }

    /// Voices the shot's dialogue line with the speaker's voice
    pub async fn generate_dialogue(&self, shot_id: &str) -> CoreResult<MediaRef> {
        let board = self.store.snapshot().await;
        let shot = Self::shot(&board, shot_id)?;

        let Some(AudioNote::Dialogue { speaker, line }) = &shot.audio else {
            return Err(CoreError::ValidationError(format!(
                "Shot {} has no dialogue",
                shot_id
            )));
        };

        let voice = match speaker.as_deref().map(|id| board.actors.get(id)) {
            Some(Some(actor)) => actor.voice.unwrap_or_default(),
            Some(None) => {
                warn!("Speaker of shot {} is not in the cast, using default voice", shot_id);
                Voice::default()
            }
            None => Voice::default(),
        };

        info!("Generating dialogue for shot {} with voice {}", shot_id, voice);
        Ok(self
            .provider
            .generate_speech(SpeechParams::new(line.clone()).with_voice(voice))
            .await?)
    }

    /// Renders the shot's sound-effect note, sized to the shot duration
    pub async fn generate_sound_effect(&self, shot_id: &str) -> CoreResult<MediaRef> {
        let board = self.store.snapshot().await;
        let shot = Self::shot(&board, shot_id)?;

        let Some(AudioNote::SoundEffect { description }) = &shot.audio else {
            return Err(CoreError::ValidationError(format!(
                "Shot {} has no sound effect",
                shot_id
            )));
        };

        let params = SoundEffectParams::new(description.clone())
            .with_duration(parse_duration(&shot.duration) as f32);
        info!("Generating sound effect for shot {}", shot_id);
        Ok(self.provider.generate_sound_effect(params).await?)
    }

    // =========================================================================
    // Scenes
    // =========================================================================

    pub async fn create_scene(&self, request: versions::NewScene) -> CoreResult<SceneId> {
        self.store
            .update(|board| versions::create_scene(board, request))
            .await
    }

    /// Generates a video for the scene's active prompt
    pub async fn generate_scene_video(&self, scene_id: &str) -> CoreResult<VersionId> {
        versions::generate(&self.store, self.provider.as_ref(), scene_id).await
    }
}

/// Image prompt for a shot, with the storyboard style appended
fn shot_image_prompt(shot: &Shot, global_style: &str) -> String {
    let prompt = shot.effective_prompt().trim();
    match global_style.trim() {
        "" => prompt.to_string(),
        style => format!("{} Style: {}", prompt, style),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::generative::{
        GenerationError, GenerationOutput, GenerationRequest, MockGenerativeProvider, ProviderKind,
    };
    use crate::core::storyboard::{Actor, SceneAnchor};
    use crate::core::AspectRatio;

    fn seeded() -> Storyboard {
        let mut board = Storyboard::new();
        board.global_style = "Cinematic".to_string();
        board.aspect_ratio = AspectRatio::Widescreen;
        board.actors.upsert(
            Actor::new("actor1", "Mara")
                .with_portrait("https://cdn/mara.png")
                .with_voice(Voice::Nova),
        );
        board.anchor = Some(SceneAnchor::new("Night market").with_images(vec!["https://cdn/market.png".to_string()]));
        board.upsert_shot(
            Shot::new("Mara runs")
                .with_id("s1")
                .with_cast(&["actor1"])
                .with_audio(AudioNote::Dialogue {
                    speaker: Some("actor1".to_string()),
                    line: "Wait!".to_string(),
                }),
        );
        board.upsert_shot(
            Shot::new("Lanterns sway")
                .with_id("s2")
                .with_duration("45s")
                .with_audio(AudioNote::SoundEffect {
                    description: "wind chimes".to_string(),
                }),
        );
        board
    }

    fn studio(provider: Arc<MockGenerativeProvider>) -> Studio {
        Studio::new(Arc::new(StoryboardStore::new(seeded())), provider)
    }

    #[tokio::test]
    async fn test_shot_image_uses_references() {
        let provider = Arc::new(MockGenerativeProvider::new());
        let studio = studio(provider.clone());

        let image = studio.generate_shot_image("s1").await.unwrap();
        let board = studio.snapshot().await;
        assert_eq!(board.shot("s1").unwrap().latest_image(), Some(&image));

        match &provider.requests()[0] {
            GenerationRequest::Image(params) => {
                assert!(params.use_conditioning);
                assert_eq!(params.primary_reference.as_deref(), Some("https://cdn/mara.png"));
                assert_eq!(params.secondary_references, vec!["https://cdn/market.png"]);
                assert_eq!(params.aspect_ratio, "16:9");
                assert!((params.strength - DEFAULT_STRENGTH).abs() < f32::EPSILON);
                assert!(params.prompt.ends_with("Style: Cinematic"));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shot_image_failure_leaves_history() {
        let provider = Arc::new(MockGenerativeProvider::new());
        provider.push_response(
            ProviderKind::Image,
            Err(GenerationError::Provider {
                status: 429,
                message: "rate limited".to_string(),
            }),
        );
        let studio = studio(provider);

        let err = studio.generate_shot_image("s1").await.unwrap_err();
        assert!(err.is_generation());
        assert!(studio.snapshot().await.shot("s1").unwrap().generated_images.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_images_for_two_shots() {
        let provider = Arc::new(MockGenerativeProvider::new().with_delay(Duration::from_millis(20)));
        let studio = studio(provider.clone());

        let (a, b) = tokio::join!(
            studio.generate_shot_image("s1"),
            studio.generate_shot_image("s2")
        );
        a.unwrap();
        b.unwrap();

        let board = studio.snapshot().await;
        assert_eq!(board.shot("s1").unwrap().generated_images.len(), 1);
        assert_eq!(board.shot("s2").unwrap().generated_images.len(), 1);
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_dialogue_uses_speaker_voice() {
        let provider = Arc::new(MockGenerativeProvider::new());
        let studio = studio(provider.clone());

        studio.generate_dialogue("s1").await.unwrap();
        match &provider.requests()[0] {
            GenerationRequest::Speech(params) => {
                assert_eq!(params.voice, Voice::Nova);
                assert_eq!(params.text, "Wait!");
            }
            other => panic!("unexpected request {:?}", other),
        }

        let err = studio.generate_dialogue("s2").await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_sound_effect_duration_clamped() {
        let provider = Arc::new(MockGenerativeProvider::new());
        let studio = studio(provider.clone());

        studio.generate_sound_effect("s2").await.unwrap();
        match &provider.requests()[0] {
            GenerationRequest::SoundEffect(params) => {
                assert_eq!(params.description, "wind chimes");
                assert!((params.duration_seconds - 30.0).abs() < f32::EPSILON);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_script_appends_shots() {
        let provider = Arc::new(MockGenerativeProvider::new());
        provider.push_response(
            ProviderKind::Analysis,
            Ok(GenerationOutput::text(
                r#"[{"description": "Dawn"}, {"description": "Dusk"}]"#,
            )),
        );
        let studio = studio(provider);

        let ids = studio.analyze_script("A day passes.", &[]).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(studio.snapshot().await.shots.len(), 4);
    }

    #[tokio::test]
    async fn test_analyze_script_never_replaces_existing_shot() {
        let provider = Arc::new(MockGenerativeProvider::new());
        provider.push_response(
            ProviderKind::Analysis,
            Ok(GenerationOutput::text(r#"[{"id": "s1", "description": "Someone else"}]"#)),
        );
        let studio = studio(provider);
        studio.generate_shot_image("s1").await.unwrap();

        let ids = studio.analyze_script("A stranger arrives.", &[]).await.unwrap();
        assert_ne!(ids[0], "s1");

        let board = studio.snapshot().await;
        let original = board.shot("s1").unwrap();
        assert_eq!(original.description, "Mara runs");
        assert_eq!(original.generated_images.len(), 1);
        assert_eq!(board.shot(&ids[0]).unwrap().description, "Someone else");
    }

    #[tokio::test]
    async fn test_scene_video_round_trip() {
        let provider = Arc::new(MockGenerativeProvider::new());
        let studio = studio(provider);

        let scene_id = studio
            .create_scene(versions::NewScene::new("Chase", vec!["s1".to_string()]))
            .await
            .unwrap();
        let version_id = studio.generate_scene_video(&scene_id).await.unwrap();

        let board = studio.snapshot().await;
        let version = board.scene(&scene_id).unwrap().version(&version_id).unwrap();
        assert!(version.assets.video.is_some());
    }
}
