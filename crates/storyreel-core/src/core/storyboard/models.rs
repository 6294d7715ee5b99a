//! Storyboard Data Models
//!
//! Shots, actors, scene anchors, and the [`Storyboard`] state container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use specta::Type;

use crate::core::generative::Voice;
use crate::core::versions::Scene;
use crate::core::{new_id, unix_now, ActorId, AspectRatio, MediaRef, SceneId, ShotId};

/// Duration assumed when a shot does not specify one
pub const DEFAULT_SHOT_DURATION: &str = "5s";

fn default_duration() -> String {
    DEFAULT_SHOT_DURATION.to_string()
}

// =============================================================================
// Shot
// =============================================================================

/// Audio note attached to a shot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Type)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AudioNote {
    /// Spoken line, rendered as quoted dialogue
    Dialogue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speaker: Option<ActorId>,
        line: String,
    },
    /// Sound effect, rendered in bracketed notation
    SoundEffect { description: String },
}

/// One entry in a shot's generated-image history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub image: MediaRef,
    pub prompt: String,
    pub created_at: i64,
}

impl GeneratedImage {
    pub fn new(image: impl Into<MediaRef>, prompt: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            prompt: prompt.into(),
            created_at: unix_now(),
        }
    }
}

/// A single planned take
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct Shot {
    pub id: ShotId,
    /// Plain visual description
    pub description: String,
    /// Director-style prompt text; the description is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Duration string such as `"5s"` or `"1500ms"`
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default)]
    pub main_cast_ids: Vec<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc_spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_movement: Option<String>,
    /// Append-only history of generated stills
    #[serde(default)]
    pub generated_images: Vec<GeneratedImage>,
}

impl Shot {
    /// Creates a shot with a fresh id and the default duration
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            prompt: None,
            duration: default_duration(),
            main_cast_ids: Vec::new(),
            npc_spec: None,
            audio: None,
            camera_movement: None,
            generated_images: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<ShotId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = duration.into();
        self
    }

    pub fn with_cast(mut self, ids: &[&str]) -> Self {
        self.main_cast_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_npc(mut self, spec: impl Into<String>) -> Self {
        self.npc_spec = Some(spec.into());
        self
    }

    pub fn with_audio(mut self, audio: AudioNote) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_camera(mut self, movement: impl Into<String>) -> Self {
        self.camera_movement = Some(movement.into());
        self
    }

    /// Director prompt when present and non-blank, otherwise the description
    pub fn effective_prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.description.trim())
    }

    /// Most recently generated still, if any
    pub fn latest_image(&self) -> Option<&GeneratedImage> {
        self.generated_images.last()
    }
}

// =============================================================================
// Actor
// =============================================================================

/// A main-cast character
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_sheet: Option<MediaRef>,
    /// Free-form voice tone tag, e.g. "gravelly baritone"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_tone: Option<String>,
    /// Speech voice used for dialogue generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            portrait: None,
            character_sheet: None,
            voice_tone: None,
            voice: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_portrait(mut self, portrait: impl Into<MediaRef>) -> Self {
        self.portrait = Some(portrait.into());
        self
    }

    pub fn with_character_sheet(mut self, sheet: impl Into<MediaRef>) -> Self {
        self.character_sheet = Some(sheet.into());
        self
    }

    pub fn with_voice_tone(mut self, tone: impl Into<String>) -> Self {
        self.voice_tone = Some(tone.into());
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Portrait, falling back to the character sheet. Blank handles are skipped.
    pub fn reference_image(&self) -> Option<&MediaRef> {
        self.portrait
            .iter()
            .chain(self.character_sheet.iter())
            .find(|image| !image.trim().is_empty())
    }
}

/// Id → actor lookup. Dangling ids resolve to `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Type)]
#[serde(transparent)]
pub struct ActorRegistry {
    actors: BTreeMap<ActorId, Actor>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Actor> {
        self.actors.get(id)
    }

    /// Inserts or replaces an actor by id
    pub fn upsert(&mut self, actor: Actor) {
        self.actors.insert(actor.id.clone(), actor);
    }

    pub fn remove(&mut self, id: &str) -> Option<Actor> {
        self.actors.remove(id)
    }

    /// Resolves ids in order, skipping unknown ones
    pub fn resolve<'a>(&'a self, ids: &'a [ActorId]) -> impl Iterator<Item = &'a Actor> + 'a {
        ids.iter().filter_map(move |id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }
}

impl FromIterator<Actor> for ActorRegistry {
    fn from_iter<T: IntoIterator<Item = Actor>>(iter: T) -> Self {
        let mut registry = ActorRegistry::new();
        for actor in iter {
            registry.upsert(actor);
        }
        registry
    }
}

// =============================================================================
// Scene Anchor
// =============================================================================

/// Reusable description + image set enforcing spatial consistency.
///
/// Collaborators cap `images` at three per anchor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct SceneAnchor {
    pub description: String,
    #[serde(default)]
    pub images: Vec<MediaRef>,
    /// Environment line; the description is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl SceneAnchor {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            images: Vec::new(),
            environment: None,
        }
    }

    pub fn with_images(mut self, images: Vec<MediaRef>) -> Self {
        self.images = images;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }
}

// =============================================================================
// Storyboard
// =============================================================================

/// Explicit state container passed into every core operation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct Storyboard {
    #[serde(default)]
    pub shots: Vec<Shot>,
    #[serde(default)]
    pub actors: ActorRegistry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<SceneAnchor>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub global_style: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

impl Storyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shot(&self, id: &str) -> Option<&Shot> {
        self.shots.iter().find(|s| s.id == id)
    }

    pub fn shot_mut(&mut self, id: &str) -> Option<&mut Shot> {
        self.shots.iter_mut().find(|s| s.id == id)
    }

    /// Replaces the shot with the same id, or appends it
    pub fn upsert_shot(&mut self, shot: Shot) {
        match self.shots.iter_mut().find(|s| s.id == shot.id) {
            Some(existing) => *existing = shot,
            None => self.shots.push(shot),
        }
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn scene_mut(&mut self, id: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id == id)
    }

    /// Scenes that include the given shot
    pub fn scenes_with_shot(&self, shot_id: &str) -> Vec<&SceneId> {
        self.scenes
            .iter()
            .filter(|scene| scene.shot_ids.iter().any(|id| id == shot_id))
            .map(|scene| &scene.id)
            .collect()
    }
}
