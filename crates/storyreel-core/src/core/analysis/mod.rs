//! Script Analysis
//!
//! Turns a script into a shot list through the analysis provider, and applies
//! chat-style shot patches to an existing storyboard.
//!
//! Model output is free text. JSON is recovered by trying, in order: the
//! whole response, a fenced ```json block, then the outermost `[...]`.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::generative::{AnalysisParams, GenerativeProvider};
use crate::core::storyboard::{AudioNote, Shot, Storyboard, DEFAULT_SHOT_DURATION};
use crate::core::versions;
use crate::core::{new_id, ActorId, CoreError, CoreResult, MediaRef, ShotId};

/// Instructions sent with every script analysis
pub const SHOT_LIST_SYSTEM_PROMPT: &str = r#"You are a film storyboard assistant.
Break the script into an ordered list of shots.
Respond with ONLY a JSON array. Each element has:
  "description": plain visual description of the shot,
  "prompt": director-style prompt for an image model,
  "duration": duration such as "5s",
  "mainCastIds": ids of the recurring actors in the shot,
  "npcSpec": short description of any background characters,
  "cameraMovement": camera direction,
  "audio": {"kind": "dialogue", "speaker": actor id, "line": text} or {"kind": "soundEffect", "description": text}.
Omit fields that do not apply."#;

const RAW_PREVIEW_CHARS: usize = 200;

// =============================================================================
// JSON recovery
// =============================================================================

fn fenced_json(text: &str) -> Option<&str> {
    let body = text.split("```json").nth(1)?;
    body.split("```").next().map(str::trim)
}

fn outermost_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Recovers a JSON array from model output
fn extract_array(text: &str) -> Option<Vec<Value>> {
    let candidates = [Some(text.trim()), fenced_json(text), outermost_array(text)];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        })
}

fn preview(text: &str) -> String {
    text.chars().take(RAW_PREVIEW_CHARS).collect()
}

// =============================================================================
// Shot list
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Text(String),
    Seconds(f64),
}

impl DurationValue {
    fn into_string(self) -> String {
        match self {
            DurationValue::Text(text) if !text.trim().is_empty() => text.trim().to_string(),
            DurationValue::Text(_) => DEFAULT_SHOT_DURATION.to_string(),
            DurationValue::Seconds(seconds) => format!("{}s", seconds),
        }
    }
}

/// String or numeric id from model output
fn draft_id(value: Value) -> Option<ShotId> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lenient shape of one analysed shot
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ShotDraft {
    id: Option<Value>,
    description: String,
    prompt: Option<String>,
    duration: Option<DurationValue>,
    #[serde(alias = "main_cast_ids", alias = "cast")]
    main_cast_ids: Vec<ActorId>,
    #[serde(alias = "npc_spec", alias = "npc")]
    npc_spec: Option<String>,
    #[serde(alias = "camera_movement", alias = "camera")]
    camera_movement: Option<String>,
    audio: Option<AudioNote>,
}

impl ShotDraft {
    fn into_shot(self) -> Option<Shot> {
        let prompt = self.prompt.filter(|p| !p.trim().is_empty());
        let description = match self.description.trim() {
            "" => prompt.clone()?,
            description => description.to_string(),
        };

        Some(Shot {
            id: self.id.and_then(draft_id).unwrap_or_else(new_id),
            description,
            prompt,
            duration: self
                .duration
                .map(DurationValue::into_string)
                .unwrap_or_else(|| DEFAULT_SHOT_DURATION.to_string()),
            main_cast_ids: self.main_cast_ids,
            npc_spec: self.npc_spec.filter(|s| !s.trim().is_empty()),
            audio: self.audio,
            camera_movement: self.camera_movement.filter(|s| !s.trim().is_empty()),
            generated_images: Vec::new(),
        })
    }
}

/// Extracts a shot list from raw analysis output.
///
/// Entries that are not objects or carry neither description nor prompt are
/// skipped. Missing ids and durations get defaults.
pub fn parse_shot_list(text: &str) -> CoreResult<Vec<Shot>> {
    let items = extract_array(text).ok_or_else(|| {
        CoreError::AnalysisParseFailed(format!("no JSON array in response: {}", preview(text)))
    })?;

    let total = items.len();
    let shots: Vec<Shot> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ShotDraft>(item).ok())
        .filter_map(ShotDraft::into_shot)
        .collect();

    if shots.len() < total {
        warn!("Skipped {} malformed shot entries", total - shots.len());
    }
    Ok(shots)
}

/// Sends a script through the analysis provider and returns the shot list
pub async fn analyze_script(
    provider: &dyn GenerativeProvider,
    script: &str,
    images: &[MediaRef],
) -> CoreResult<Vec<Shot>> {
    let params = images.iter().fold(
        AnalysisParams::new(SHOT_LIST_SYSTEM_PROMPT, script),
        |params, image| params.with_image(image.clone()),
    );

    info!(
        "Analyzing script ({} chars, {} images) with {}",
        script.len(),
        images.len(),
        provider.name()
    );
    let text = provider.analyze(params).await?;
    debug!("Analysis returned {} chars", text.len());

    let shots = parse_shot_list(&text)?;
    info!("Analysis produced {} shots", shots.len());
    Ok(shots)
}

/// Appends analysed shots, giving a fresh id to any that collides with a
/// shot already on the board. Returns the ids as stored.
pub fn append_shots(board: &mut Storyboard, shots: Vec<Shot>) -> Vec<ShotId> {
    let mut ids = Vec::with_capacity(shots.len());
    for mut shot in shots {
        if board.shot(&shot.id).is_some() {
            let fresh = new_id();
            debug!("Shot id {} already taken, using {}", shot.id, fresh);
            shot.id = fresh;
        }
        ids.push(shot.id.clone());
        board.shots.push(shot);
    }
    ids
}

// =============================================================================
// Shot patches
// =============================================================================

/// One chat-style edit
#[derive(Debug, Clone, PartialEq)]
pub enum ShotPatch {
    /// Field overrides for the shot with this id; unknown ids create a shot
    Upsert { id: ShotId, fields: Map<String, Value> },
    Delete { id: ShotId },
}

impl ShotPatch {
    fn from_value(value: Value) -> CoreResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(CoreError::AnalysisParseFailed(
                "patch entries must be objects".to_string(),
            ));
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            _ => {
                return Err(CoreError::AnalysisParseFailed(
                    "patch entry without an id".to_string(),
                ))
            }
        };

        match fields.remove("op") {
            Some(Value::String(op)) if op == "delete" => Ok(ShotPatch::Delete { id }),
            _ => Ok(ShotPatch::Upsert { id, fields }),
        }
    }
}

/// Counts of applied patches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub updated: usize,
    pub created: usize,
    pub deleted: usize,
}

/// Parses chat output into patches
pub fn parse_shot_patches(text: &str) -> CoreResult<Vec<ShotPatch>> {
    let items = extract_array(text).ok_or_else(|| {
        CoreError::AnalysisParseFailed(format!("no JSON array in response: {}", preview(text)))
    })?;
    items.into_iter().map(ShotPatch::from_value).collect()
}

fn patched_shot(base: Value, id: &str, fields: &Map<String, Value>) -> CoreResult<Shot> {
    let mut merged = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in fields {
        merged.insert(key.clone(), value.clone());
    }
    merged.insert("id".to_string(), Value::String(id.to_string()));

    serde_json::from_value(Value::Object(merged))
        .map_err(|e| CoreError::ValidationError(format!("Invalid patch for shot {}: {}", id, e)))
}

/// Applies patches to the storyboard's shots.
///
/// Each patched shot is rebuilt as a whole value and scenes using it are
/// recompiled. Deleting a shot that a scene still uses is rejected, as is a
/// change that pushes a scene outside the policy. Run inside [`StoryboardStore::update`] so a
/// rejected patch list leaves nothing applied.
///
/// [`StoryboardStore::update`]: crate::core::storyboard::StoryboardStore::update
pub fn apply_shot_patches(board: &mut Storyboard, patches: Vec<ShotPatch>) -> CoreResult<PatchSummary> {
    let mut summary = PatchSummary::default();
    let mut changed: Vec<ShotId> = Vec::new();

    for patch in patches {
        match patch {
            ShotPatch::Delete { id } => {
                if let Some(scene) = board.scenes_with_shot(&id).first() {
                    return Err(CoreError::ValidationError(format!(
                        "Shot {} is used by scene {}",
                        id, scene
                    )));
                }
                let before = board.shots.len();
                board.shots.retain(|shot| shot.id != id);
                if board.shots.len() == before {
                    return Err(CoreError::ShotNotFound(id));
                }
                summary.deleted += 1;
            }
            ShotPatch::Upsert { id, fields } => {
                let existing = board.shot(&id).map(serde_json::to_value).transpose()?;
                let is_new = existing.is_none();
                let shot = patched_shot(existing.unwrap_or(Value::Null), &id, &fields)?;
                board.upsert_shot(shot);
                changed.push(id);
                if is_new {
                    summary.created += 1;
                } else {
                    summary.updated += 1;
                }
            }
        }
    }

    versions::refresh_scenes(board, &changed)?;

    debug!(
        "Applied shot patches: {} updated, {} created, {} deleted",
        summary.updated, summary.created, summary.deleted
    );
    Ok(summary)
}

// =============================================================================
// Tests
// =============================================================================
