//! Version Ledger
//!
//! Per-scene state machine over `{Live} ∪ {saved versions}`. Every
//! transition is a plain function over a [`Storyboard`] and validates before
//! it mutates, so a rejected transition leaves the scene exactly as it was.
//! Run them through [`StoryboardStore::update`] to get whole-value commits.

use tracing::{debug, info, warn};

use super::models::{ActiveVersion, Direction, Scene, Version, VersionAssets, VersionKind};
use crate::core::generative::{GenerativeProvider, VideoParams};
use crate::core::prompt::{
    check_policy, compile, parse_technical_specs, round_up_to_step, total_seconds, CompiledPrompt,
};
use crate::core::storyboard::{Shot, Storyboard, StoryboardStore};
use crate::core::{
    new_id, unix_now, ActorId, AspectRatio, CoreError, CoreResult, MediaRef, SceneId, ShotId,
    VersionId,
};

/// Parameters for a new scene
#[derive(Debug, Clone, PartialEq)]
pub struct NewScene {
    pub name: String,
    pub shot_ids: Vec<ShotId>,
    /// Falls back to the storyboard style
    pub global_style: Option<String>,
    /// Falls back to the storyboard ratio
    pub aspect_ratio: Option<AspectRatio>,
}

impl NewScene {
    pub fn new(name: impl Into<String>, shot_ids: Vec<ShotId>) -> Self {
        Self {
            name: name.into(),
            shot_ids,
            global_style: None,
            aspect_ratio: None,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.global_style = Some(style.into());
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }
}

/// Captured at submission so the result lands on the version that was
/// active then, whatever the pointer does in the meantime
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationTicket {
    pub scene_id: SceneId,
    pub target: ActiveVersion,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub duration_seconds: u32,
    pub start_frame: Option<MediaRef>,
}

impl GenerationTicket {
    pub fn video_params(&self) -> VideoParams {
        let params = VideoParams::new(self.prompt.clone())
            .with_duration(self.duration_seconds)
            .with_aspect_ratio(self.aspect_ratio);
        match &self.start_frame {
            Some(frame) => params.with_start_frame(frame.clone()),
            None => params,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn resolve_shots<'a>(board: &'a Storyboard, shot_ids: &[ShotId]) -> CoreResult<Vec<&'a Shot>> {
    shot_ids
        .iter()
        .map(|id| board.shot(id).ok_or_else(|| CoreError::ShotNotFound(id.clone())))
        .collect()
}

/// Deduplicated union of the shots' main cast, in first-seen order
fn cast_union(shots: &[&Shot]) -> Vec<ActorId> {
    let mut cast: Vec<ActorId> = Vec::new();
    for id in shots.iter().flat_map(|shot| shot.main_cast_ids.iter()) {
        if !cast.contains(id) {
            cast.push(id.clone());
        }
    }
    cast
}

/// Latest generated still of each shot
fn preview_frames(shots: &[&Shot]) -> Vec<MediaRef> {
    shots
        .iter()
        .filter_map(|shot| shot.latest_image().map(|image| image.image.clone()))
        .collect()
}

struct Composition {
    compiled: CompiledPrompt,
    cast_ids: Vec<ActorId>,
    preview_frames: Vec<MediaRef>,
}

fn compose(
    board: &Storyboard,
    shot_ids: &[ShotId],
    global_style: &str,
    aspect_ratio: AspectRatio,
) -> CoreResult<Composition> {
    let shots = resolve_shots(board, shot_ids)?;
    check_policy(&shots).map_err(CoreError::PolicyViolation)?;

    let cast_ids = cast_union(&shots);
    let compiled = compile(
        &shots,
        global_style,
        &cast_ids,
        aspect_ratio,
        board.anchor.as_ref(),
        &board.actors,
    )
    .ok_or_else(|| CoreError::PolicyViolation("Shot selection rejected".to_string()))?;

    Ok(Composition {
        compiled,
        cast_ids,
        preview_frames: preview_frames(&shots),
    })
}

fn scene<'a>(board: &'a Storyboard, scene_id: &str) -> CoreResult<&'a Scene> {
    board
        .scene(scene_id)
        .ok_or_else(|| CoreError::SceneNotFound(scene_id.to_string()))
}

/// Swaps in a new value for an existing scene
fn commit(board: &mut Storyboard, scene: Scene) -> CoreResult<()> {
    let slot = board
        .scene_mut(&scene.id)
        .ok_or_else(|| CoreError::SceneNotFound(scene.id.clone()))?;
    *slot = scene;
    Ok(())
}

// =============================================================================
// Transitions
// =============================================================================

/// Compiles the selection into a new scene. Nothing is created on rejection.
pub fn create_scene(board: &mut Storyboard, request: NewScene) -> CoreResult<SceneId> {
    let global_style = request
        .global_style
        .unwrap_or_else(|| board.global_style.clone());
    let aspect_ratio = request.aspect_ratio.unwrap_or(board.aspect_ratio);
    let composition = compose(board, &request.shot_ids, &global_style, aspect_ratio)?;

    let scene = Scene {
        id: new_id(),
        name: request.name,
        shot_ids: request.shot_ids,
        cast_ids: composition.cast_ids,
        global_style,
        aspect_ratio,
        versions: Vec::new(),
        active: ActiveVersion::Live,
        draft_prompt: composition.compiled.prompt,
        manual_override: false,
        preview_frames: composition.preview_frames,
        created_at: unix_now(),
    };
    let id = scene.id.clone();
    info!("Created scene {} with {} shots", id, scene.shot_ids.len());
    board.scenes.push(scene);
    Ok(id)
}

/// Changes the shot composition. The policy is checked first; the draft is
/// recompiled unless a manual edit is in force.
pub fn set_shots(board: &mut Storyboard, scene_id: &str, shot_ids: Vec<ShotId>) -> CoreResult<()> {
    let current = scene(board, scene_id)?;
    let composition = compose(board, &shot_ids, &current.global_style, current.aspect_ratio)?;

    let mut next = current.clone();
    next.shot_ids = shot_ids;
    next.cast_ids = composition.cast_ids;
    next.preview_frames = composition.preview_frames;
    if !next.manual_override {
        next.draft_prompt = composition.compiled.prompt;
    }
    commit(board, next)
}

/// Replaces the draft text and sets the manual override
pub fn edit_draft(board: &mut Storyboard, scene_id: &str, text: impl Into<String>) -> CoreResult<()> {
    let mut next = scene(board, scene_id)?.clone();
    next.draft_prompt = text.into();
    next.manual_override = true;
    next.active = ActiveVersion::Live;
    commit(board, next)
}

/// Clears the manual override and recompiles the draft
pub fn recompose(board: &mut Storyboard, scene_id: &str) -> CoreResult<()> {
    let current = scene(board, scene_id)?;
    let composition = compose(
        board,
        &current.shot_ids,
        &current.global_style,
        current.aspect_ratio,
    )?;

    let mut next = current.clone();
    next.cast_ids = composition.cast_ids;
    next.preview_frames = composition.preview_frames;
    next.draft_prompt = composition.compiled.prompt;
    next.manual_override = false;
    commit(board, next)
}

/// Snapshots the draft and current preview frames into a new version
pub fn save(board: &mut Storyboard, scene_id: &str) -> CoreResult<VersionId> {
    let current = scene(board, scene_id)?;
    let frames = preview_frames(&resolve_shots(board, &current.shot_ids)?);

    let version = Version::new(
        VersionKind::DraftSnapshot,
        current.draft_prompt.clone(),
        VersionAssets {
            preview_frames: frames.clone(),
            video: None,
        },
    );
    let version_id = version.id.clone();

    let mut next = current.clone();
    next.preview_frames = frames;
    next.versions.push(version);
    next.active = ActiveVersion::Version(version_id.clone());
    commit(board, next)?;

    info!("Saved version {} of scene {}", version_id, scene_id);
    Ok(version_id)
}

/// Moves the active pointer one step, wrapping at both ends
pub fn navigate(board: &mut Storyboard, scene_id: &str, direction: Direction) -> CoreResult<ActiveVersion> {
    let current = scene(board, scene_id)?;
    let len = current.versions.len() + 1;
    let position = current.cycle_position();
    let target = match direction {
        Direction::Forward => (position + 1) % len,
        Direction::Backward => (position + len - 1) % len,
    };

    let active = if target == 0 {
        ActiveVersion::Live
    } else {
        ActiveVersion::Version(current.versions[target - 1].id.clone())
    };

    let mut next = current.clone();
    next.active = active.clone();
    commit(board, next)?;
    Ok(active)
}

/// Recompiles every scene that uses one of the changed shots.
///
/// Cast and preview frames follow the shots; the draft is replaced unless a
/// manual edit is in force. Scenes under a manual override are left alone.
/// Fails if any affected scene no longer passes the policy.
pub fn refresh_scenes(board: &mut Storyboard, changed: &[ShotId]) -> CoreResult<usize> {
    let affected: Vec<SceneId> = board
        .scenes
        .iter()
        .filter(|scene| !scene.manual_override)
        .filter(|scene| scene.shot_ids.iter().any(|id| changed.contains(id)))
        .map(|scene| scene.id.clone())
        .collect();

    for scene_id in &affected {
        let current = scene(board, scene_id)?;
        let composition = compose(
            board,
            &current.shot_ids,
            &current.global_style,
            current.aspect_ratio,
        )?;

        let mut next = current.clone();
        next.cast_ids = composition.cast_ids;
        next.preview_frames = composition.preview_frames;
        next.draft_prompt = composition.compiled.prompt;
        commit(board, next)?;
    }

    if !affected.is_empty() {
        debug!("Recompiled {} scenes after shot changes", affected.len());
    }
    Ok(affected.len())
}

/// Removes a scene. Shots and actors are left untouched.
pub fn delete_scene(board: &mut Storyboard, scene_id: &str) -> CoreResult<Scene> {
    let index = board
        .scenes
        .iter()
        .position(|scene| scene.id == scene_id)
        .ok_or_else(|| CoreError::SceneNotFound(scene_id.to_string()))?;
    let removed = board.scenes.remove(index);
    info!("Deleted scene {}", scene_id);
    Ok(removed)
}

/// Captures the active prompt and target for a video generation
pub fn begin_generation(board: &Storyboard, scene_id: &str) -> CoreResult<GenerationTicket> {
    let current = scene(board, scene_id)?;
    let prompt = current.active_prompt().to_string();
    if prompt.trim().is_empty() {
        return Err(CoreError::ValidationError(format!(
            "Scene {} has an empty prompt",
            scene_id
        )));
    }

    let (aspect_ratio, duration_seconds) = match parse_technical_specs(&prompt) {
        Some(specs) => (specs.aspect_ratio, specs.duration_seconds),
        None => {
            let total = total_seconds(
                current
                    .shot_ids
                    .iter()
                    .filter_map(|id| board.shot(id))
                    .map(|shot| shot.duration.as_str()),
            );
            (current.aspect_ratio, round_up_to_step(total))
        }
    };

    Ok(GenerationTicket {
        scene_id: current.id.clone(),
        target: current.active.clone(),
        prompt,
        aspect_ratio,
        duration_seconds,
        start_frame: current.active_preview_frames().first().cloned(),
    })
}

/// Applies a finished video to the version that was active at submission.
///
/// A saved target is replaced by a copy carrying the video; a live target is
/// promoted into a new `Generated` version that becomes active.
pub fn complete_generation(
    board: &mut Storyboard,
    ticket: &GenerationTicket,
    video: MediaRef,
) -> CoreResult<VersionId> {
    let mut next = scene(board, &ticket.scene_id)?.clone();

    let version_id = match &ticket.target {
        ActiveVersion::Version(id) => {
            let slot = next
                .versions
                .iter_mut()
                .find(|v| &v.id == id)
                .ok_or_else(|| CoreError::VersionNotFound(id.clone()))?;
            *slot = slot.with_video(video);
            id.clone()
        }
        ActiveVersion::Live => {
            let version = Version::new(
                VersionKind::Generated,
                ticket.prompt.clone(),
                VersionAssets {
                    preview_frames: next.preview_frames.clone(),
                    video: Some(video),
                },
            );
            let id = version.id.clone();
            next.versions.push(version);
            next.active = ActiveVersion::Version(id.clone());
            id
        }
    };

    commit(board, next)?;
    info!("Attached video to version {} of scene {}", version_id, ticket.scene_id);
    Ok(version_id)
}

/// Generates a video for the scene's active prompt and records the result
pub async fn generate(
    store: &StoryboardStore,
    provider: &dyn GenerativeProvider,
    scene_id: &str,
) -> CoreResult<VersionId> {
    let board = store.snapshot().await;
    let ticket = begin_generation(&board, scene_id)?;
    info!(
        "Generating {}s video for scene {} ({:?})",
        ticket.duration_seconds, scene_id, ticket.target
    );

    let result = match provider.generate_video(ticket.video_params()).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Video generation for scene {} failed: {}", scene_id, e);
            return Err(e.into());
        }
    };

    store
        .update(|board| complete_generation(board, &ticket, result.video))
        .await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generative::{GenerationError, GenerationRequest, MockGenerativeProvider, ProviderKind};
    use crate::core::storyboard::{Actor, GeneratedImage};

    fn board() -> Storyboard {
        let mut board = Storyboard::new();
        board.actors.upsert(Actor::new("actor1", "Mara").with_portrait("https://cdn/mara.png"));
        board.upsert_shot(Shot::new("Mara runs").with_id("s1").with_cast(&["actor1"]));
        board.upsert_shot(Shot::new("Vendor shouts").with_id("s2").with_npc("a street vendor").with_duration("6s"));
        for i in 3..=6 {
            board.upsert_shot(Shot::new(format!("quick {}", i)).with_id(format!("s{}", i)).with_duration("2s"));
        }
        board
    }

    fn ids(values: &[&str]) -> Vec<ShotId> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn new_scene(board: &mut Storyboard) -> SceneId {
        create_scene(
            board,
            NewScene::new("Market", ids(&["s1", "s2"]))
                .with_style("Cinematic")
                .with_aspect_ratio(AspectRatio::Widescreen),
        )
        .unwrap()
    }

    #[test]
    fn test_create_scene() {
        let mut board = board();
        let id = new_scene(&mut board);
        let scene = board.scene(&id).unwrap();
        assert_eq!(scene.cast_ids, vec!["actor1"]);
        assert_eq!(scene.active, ActiveVersion::Live);
        assert!(scene.draft_prompt.contains("--ar 16:9 --duration 15s --quality high"));
    }

    #[test]
    fn test_create_scene_policy_violation_creates_nothing() {
        let mut board = board();
        let err = create_scene(&mut board, NewScene::new("Dense", ids(&["s3", "s4", "s5", "s6"]))).unwrap_err();
        assert!(matches!(err, CoreError::PolicyViolation(_)));
        assert!(board.scenes.is_empty());
    }

    #[test]
    fn test_create_scene_unknown_shot() {
        let mut board = board();
        let err = create_scene(&mut board, NewScene::new("x", ids(&["nope"]))).unwrap_err();
        assert!(matches!(err, CoreError::ShotNotFound(_)));
    }

    #[test]
    fn test_set_shots_rejected_leaves_scene_untouched() {
        let mut board = board();
        let id = new_scene(&mut board);
        let before = board.scene(&id).unwrap().clone();

        let err = set_shots(&mut board, &id, ids(&["s3", "s4", "s5", "s6"])).unwrap_err();
        assert!(matches!(err, CoreError::PolicyViolation(_)));
        assert_eq!(board.scene(&id).unwrap(), &before);
    }

    #[test]
    fn test_manual_override_and_recompose() {
        let mut board = board();
        let id = new_scene(&mut board);

        edit_draft(&mut board, &id, "my hand-written prompt").unwrap();
        set_shots(&mut board, &id, ids(&["s2"])).unwrap();
        let scene = board.scene(&id).unwrap();
        assert!(scene.manual_override);
        assert_eq!(scene.draft_prompt, "my hand-written prompt");
        assert!(scene.cast_ids.is_empty());

        recompose(&mut board, &id).unwrap();
        let scene = board.scene(&id).unwrap();
        assert!(!scene.manual_override);
        assert!(scene.draft_prompt.contains("[0s-6s]"));
    }

    #[test]
    fn test_save_snapshots_preview_frames() {
        let mut board = board();
        let id = new_scene(&mut board);
        board
            .shot_mut("s1")
            .unwrap()
            .generated_images
            .push(GeneratedImage::new("https://img/s1.png", "p"));

        let version_id = save(&mut board, &id).unwrap();
        let scene = board.scene(&id).unwrap();
        let version = scene.version(&version_id).unwrap();
        assert_eq!(version.kind, VersionKind::DraftSnapshot);
        assert_eq!(version.prompt, scene.draft_prompt);
        assert_eq!(version.assets.preview_frames, vec!["https://img/s1.png"]);
        assert_eq!(scene.active, ActiveVersion::Version(version_id));
    }

    #[test]
    fn test_navigation_cycles() {
        let mut board = board();
        let id = new_scene(&mut board);
        let saves = 3;
        for _ in 0..saves {
            save(&mut board, &id).unwrap();
        }
        navigate(&mut board, &id, Direction::Forward).unwrap();
        assert_eq!(board.scene(&id).unwrap().active, ActiveVersion::Live);

        for _ in 0..=saves {
            navigate(&mut board, &id, Direction::Forward).unwrap();
        }
        assert_eq!(board.scene(&id).unwrap().active, ActiveVersion::Live);

        let back = navigate(&mut board, &id, Direction::Backward).unwrap();
        let last = board.scene(&id).unwrap().versions.last().unwrap().id.clone();
        assert_eq!(back, ActiveVersion::Version(last));
    }

    #[test]
    fn test_navigation_without_versions_stays_live() {
        let mut board = board();
        let id = new_scene(&mut board);
        assert_eq!(navigate(&mut board, &id, Direction::Backward).unwrap(), ActiveVersion::Live);
    }

    #[test]
    fn test_refresh_follows_changed_shot() {
        let mut board = board();
        let id = new_scene(&mut board);
        let edited = create_scene(&mut board, NewScene::new("Edited", ids(&["s1"]))).unwrap();
        edit_draft(&mut board, &edited, "keep me").unwrap();

        let shot = board.shot_mut("s1").unwrap();
        shot.description = "Mara walks".to_string();
        shot.duration = "9s".to_string();

        assert_eq!(refresh_scenes(&mut board, &ids(&["s1"])).unwrap(), 1);
        let draft = &board.scene(&id).unwrap().draft_prompt;
        assert!(draft.contains("Mara walks"));
        assert!(draft.contains("[0s-9s]"));
        assert!(draft.contains("--duration 15s"));
        assert_eq!(board.scene(&edited).unwrap().draft_prompt, "keep me");
    }

    #[test]
    fn test_refresh_rejects_policy_breaking_change() {
        let mut board = board();
        board.upsert_shot(Shot::new("long a").with_id("s7").with_duration("10s"));
        board.upsert_shot(Shot::new("long b").with_id("s8").with_duration("10s"));
        create_scene(&mut board, NewScene::new("Long", ids(&["s1", "s2", "s7", "s8"]))).unwrap();

        // 5s + 6s + 1s + 1s across four shots is short-form
        board.shot_mut("s7").unwrap().duration = "1s".to_string();
        board.shot_mut("s8").unwrap().duration = "1s".to_string();

        let err = refresh_scenes(&mut board, &ids(&["s7", "s8"])).unwrap_err();
        assert!(matches!(err, CoreError::PolicyViolation(_)));
    }

    #[test]
    fn test_delete_scene_keeps_shots() {
        let mut board = board();
        let id = new_scene(&mut board);
        delete_scene(&mut board, &id).unwrap();
        assert!(board.scenes.is_empty());
        assert_eq!(board.shots.len(), 6);
        assert!(matches!(delete_scene(&mut board, &id), Err(CoreError::SceneNotFound(_))));
    }

    #[test]
    fn test_completion_on_saved_version_replaces_entry() {
        let mut board = board();
        let id = new_scene(&mut board);
        let version_id = save(&mut board, &id).unwrap();
        let original = board.scene(&id).unwrap().version(&version_id).unwrap().clone();

        let ticket = begin_generation(&board, &id).unwrap();
        assert_eq!(ticket.target, ActiveVersion::Version(version_id.clone()));
        assert_eq!(ticket.duration_seconds, 15);
        assert_eq!(ticket.aspect_ratio, AspectRatio::Widescreen);

        // Pointer moves while the job runs
        navigate(&mut board, &id, Direction::Forward).unwrap();

        let attached = complete_generation(&mut board, &ticket, "https://v/1.mp4".into()).unwrap();
        assert_eq!(attached, version_id);
        let scene = board.scene(&id).unwrap();
        let updated = scene.version(&version_id).unwrap();
        assert_eq!(updated.prompt, original.prompt);
        assert_eq!(updated.assets.video.as_deref(), Some("https://v/1.mp4"));
        assert_eq!(scene.versions.len(), 1);
    }

    #[test]
    fn test_completion_on_live_promotes_new_version() {
        let mut board = board();
        let id = new_scene(&mut board);
        let ticket = begin_generation(&board, &id).unwrap();
        edit_draft(&mut board, &id, "edited after submit").unwrap();

        let version_id = complete_generation(&mut board, &ticket, "https://v/2.mp4".into()).unwrap();
        let scene = board.scene(&id).unwrap();
        let version = scene.version(&version_id).unwrap();
        assert_eq!(version.kind, VersionKind::Generated);
        assert_eq!(version.prompt, ticket.prompt);
        assert_eq!(scene.draft_prompt, "edited after submit");
        assert_eq!(scene.active, ActiveVersion::Version(version_id));
    }

    #[test]
    fn test_completion_after_scene_deleted() {
        let mut board = board();
        let id = new_scene(&mut board);
        let ticket = begin_generation(&board, &id).unwrap();
        delete_scene(&mut board, &id).unwrap();
        let err = complete_generation(&mut board, &ticket, "https://v/3.mp4".into()).unwrap_err();
        assert!(matches!(err, CoreError::SceneNotFound(_)));
    }

    #[tokio::test]
    async fn test_generate_through_store() {
        let mut seeded = board();
        let id = new_scene(&mut seeded);
        let store = StoryboardStore::new(seeded);
        let provider = MockGenerativeProvider::new();

        let version_id = generate(&store, &provider, &id).await.unwrap();
        let board = store.snapshot().await;
        let scene = board.scene(&id).unwrap();
        assert_eq!(scene.active, ActiveVersion::Version(version_id));

        match &provider.requests()[0] {
            GenerationRequest::Video(params) => {
                assert_eq!(params.duration_seconds, 15);
                assert_eq!(params.aspect_ratio, AspectRatio::Widescreen);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_failure_leaves_scene_untouched() {
        let mut seeded = board();
        let id = new_scene(&mut seeded);
        let store = StoryboardStore::new(seeded);
        let before = store.snapshot().await;

        let provider = MockGenerativeProvider::new();
        provider.push_response(ProviderKind::Video, Err(GenerationError::PollTimeout { attempts: 120 }));

        let err = generate(&store, &provider, &id).await.unwrap_err();
        assert!(err.is_generation());
        assert_eq!(*store.snapshot().await, *before);
    }
}
