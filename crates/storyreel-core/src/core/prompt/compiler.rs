//! Multi-Shot Prompt Compiler
//!
//! Compiles an ordered shot selection into one four-section document for
//! long-form video generation:
//!
//! 1. `[Global Context]`: style, scene anchor, environment, fixed realism lines
//! 2. `[Main Cast]`: only when at least one cast id resolves
//! 3. `[Timeline Script]`: one line per shot with running time windows
//! 4. `[Technical Specs]`: always the last line of the document
//!
//! Compilation is deterministic and pure. Short, dense selections are
//! rejected by the casting/duration policy.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use specta::Type;

use super::duration::{format_seconds, parse_duration, round_up_to_step};
use crate::core::storyboard::{Actor, ActorRegistry, AudioNote, SceneAnchor, Shot};
use crate::core::{ActorId, AspectRatio, MediaRef};

pub const SECTION_GLOBAL_CONTEXT: &str = "[Global Context]";
pub const SECTION_MAIN_CAST: &str = "[Main Cast]";
pub const SECTION_TIMELINE: &str = "[Timeline Script]";
pub const SECTION_TECHNICAL: &str = "[Technical Specs]";

/// Separator between timeline lines
pub const TRANSITION_MARKER: &str = "--- CUT TO ---";

/// Fixed quality flag closing the technical specs
pub const QUALITY_FLAG: &str = "--quality high";

/// Selections at or below this total are short-form
pub const SHORT_FORM_MAX_SECONDS: f64 = 15.0;

/// Shots allowed in one short-form selection
pub const SHORT_FORM_MAX_SHOTS: usize = 3;

const DEFAULT_STYLE: &str = "Natural cinematic look";

const MOTION_DIRECTIVE: &str =
    "Motion: Realistic motion and physics, with natural weight, momentum and continuity between shots.";

const AMBIENCE_DIRECTIVE: &str =
    "Audio: Ambient sound design consistent with the environment; dialogue clear and in sync.";

const CONSISTENCY_DIRECTIVE: &str =
    "Keep every cast member's face, hair, wardrobe and proportions identical across all shots.";

/// Result of a successful compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPrompt {
    pub prompt: String,
    /// Exact sum of shot durations
    pub total_duration_seconds: f64,
    /// Total rounded up to the next multiple of five
    pub technical_duration_seconds: u32,
    pub primary_cast_reference: Option<MediaRef>,
    pub scene_anchor_images: Vec<MediaRef>,
}

/// Aspect ratio and duration read back out of a compiled document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TechnicalSpecs {
    pub aspect_ratio: AspectRatio,
    pub duration_seconds: u32,
}

// =============================================================================
// Policy
// =============================================================================

/// Applies the casting/duration policy, returning the summed duration.
///
/// Rejects empty selections and short-form selections with too many shots.
pub fn check_policy(shots: &[&Shot]) -> Result<f64, String> {
    if shots.is_empty() {
        return Err("A scene needs at least one shot".to_string());
    }

    let total = super::duration::total_seconds(shots.iter().map(|shot| shot.duration.as_str()));
    if total <= SHORT_FORM_MAX_SECONDS && shots.len() > SHORT_FORM_MAX_SHOTS {
        return Err(format!(
            "{} shots totalling {}s: short-form scenes (<= {}s) allow at most {} shots",
            shots.len(),
            format_seconds(total),
            SHORT_FORM_MAX_SECONDS,
            SHORT_FORM_MAX_SHOTS
        ));
    }
    Ok(total)
}

// =============================================================================
// Compilation
// =============================================================================

/// Compiles a shot selection. `None` when the policy rejects it.
pub fn compile(
    shots: &[&Shot],
    global_style: &str,
    cast_ids: &[ActorId],
    aspect_ratio: AspectRatio,
    anchor: Option<&SceneAnchor>,
    actors: &ActorRegistry,
) -> Option<CompiledPrompt> {
    let total = check_policy(shots).ok()?;
    let technical = round_up_to_step(total);

    let mut sections = vec![global_context(global_style, anchor)];
    if let Some(cast) = main_cast(cast_ids, actors) {
        sections.push(cast);
    }
    sections.push(timeline(shots, actors));
    sections.push(format!(
        "{}\n--ar {} --duration {}s {}",
        SECTION_TECHNICAL,
        aspect_ratio.as_str(),
        technical,
        QUALITY_FLAG
    ));

    Some(CompiledPrompt {
        prompt: sections.join("\n\n"),
        total_duration_seconds: total,
        technical_duration_seconds: technical,
        primary_cast_reference: primary_cast_reference(shots, cast_ids, actors),
        scene_anchor_images: anchor.map(|a| a.images.clone()).unwrap_or_default(),
    })
}

fn global_context(global_style: &str, anchor: Option<&SceneAnchor>) -> String {
    let style = global_style.trim();
    let mut lines = vec![
        SECTION_GLOBAL_CONTEXT.to_string(),
        format!("Style: {}", if style.is_empty() { DEFAULT_STYLE } else { style }),
    ];

    if let Some(anchor) = anchor {
        let description = anchor.description.trim();
        if !description.is_empty() {
            lines.push(format!("Scene: {}", description));
        }
        let environment = anchor
            .environment
            .as_deref()
            .map(str::trim)
            .filter(|env| !env.is_empty())
            .unwrap_or(description);
        if !environment.is_empty() {
            lines.push(format!("Environment: {}", environment));
        }
    }

    lines.push(MOTION_DIRECTIVE.to_string());
    lines.push(AMBIENCE_DIRECTIVE.to_string());
    lines.join("\n")
}

fn main_cast(cast_ids: &[ActorId], actors: &ActorRegistry) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    let resolved: Vec<&Actor> = actors
        .resolve(cast_ids)
        .filter(|actor| {
            if seen.contains(&actor.id.as_str()) {
                false
            } else {
                seen.push(actor.id.as_str());
                true
            }
        })
        .collect();
    if resolved.is_empty() {
        return None;
    }

    let mut lines = vec![SECTION_MAIN_CAST.to_string()];
    for actor in resolved {
        let mut line = format!("- {}", actor.name.trim());
        let description = actor.description.trim();
        if !description.is_empty() {
            line.push_str(&format!(": {}", description));
        }
        if let Some(tone) = actor.voice_tone.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            line.push_str(&format!(" (Voice: {})", tone));
        }
        lines.push(line);
    }
    lines.push(CONSISTENCY_DIRECTIVE.to_string());
    Some(lines.join("\n"))
}

fn timeline(shots: &[&Shot], actors: &ActorRegistry) -> String {
    let mut start = 0.0;
    let mut entries = Vec::with_capacity(shots.len());

    for shot in shots {
        let end = ((start + parse_duration(&shot.duration)) * 1000.0_f64).round() / 1000.0;
        entries.push(shot_line(shot, actors, start, end));
        start = end;
    }

    format!(
        "{}\n{}",
        SECTION_TIMELINE,
        entries.join(&format!("\n{}\n", TRANSITION_MARKER))
    )
}

fn shot_line(shot: &Shot, actors: &ActorRegistry, start: f64, end: f64) -> String {
    let mut line = format!(
        "[{}-{}] {}",
        format_seconds(start),
        format_seconds(end),
        shot.effective_prompt()
    );

    let names: Vec<&str> = actors
        .resolve(&shot.main_cast_ids)
        .map(|actor| actor.name.trim())
        .collect();
    if !names.is_empty() {
        line.push_str(&format!(" Featuring: {}.", names.join(", ")));
    }

    if let Some(npc) = shot.npc_spec.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        line.push_str(&format!(" NPC: {}.", npc));
    }

    if let Some(camera) = shot
        .camera_movement
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        line.push_str(&format!(" Camera: {}.", camera));
    }

    match &shot.audio {
        Some(AudioNote::Dialogue { speaker, line: text }) if !text.trim().is_empty() => {
            let speaker = speaker
                .as_deref()
                .and_then(|id| actors.get(id))
                .map(|actor| format!("{} says ", actor.name.trim()))
                .unwrap_or_default();
            line.push_str(&format!(" Audio: {}\"{}\"", speaker, text.trim()));
        }
        Some(AudioNote::SoundEffect { description }) if !description.trim().is_empty() => {
            line.push_str(&format!(" Audio: [{}]", description.trim()));
        }
        _ => {}
    }

    line
}

/// Portrait (sheet fallback) of the first cast member with an image, scanning
/// each shot's cast in order, then the scene cast list.
fn primary_cast_reference(
    shots: &[&Shot],
    cast_ids: &[ActorId],
    actors: &ActorRegistry,
) -> Option<MediaRef> {
    shots
        .iter()
        .flat_map(|shot| shot.main_cast_ids.iter())
        .chain(cast_ids.iter())
        .filter_map(|id| actors.get(id))
        .find_map(|actor| actor.reference_image().cloned())
}

// =============================================================================
// Technical Specs Extraction
// =============================================================================

fn specs_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"--ar\s+(\S+)\s+--duration\s+(\d+)s").ok())
        .as_ref()
}

/// Reads aspect ratio and duration from the last technical specs line
pub fn parse_technical_specs(prompt: &str) -> Option<TechnicalSpecs> {
    let caps = specs_pattern()?.captures_iter(prompt).last()?;
    let aspect_ratio = AspectRatio::parse_or_default(caps.get(1)?.as_str());
    let duration_seconds = caps.get(2)?.as_str().parse().ok()?;
    Some(TechnicalSpecs {
        aspect_ratio,
        duration_seconds,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ActorRegistry {
        vec![
            Actor::new("actor1", "Mara")
                .with_description("wiry courier in a yellow raincoat")
                .with_voice_tone("husky")
                .with_portrait("https://cdn/mara.png"),
            Actor::new("actor2", "Ivo").with_character_sheet("https://cdn/ivo-sheet.png"),
            Actor::new("actor3", "Lena"),
        ]
        .into_iter()
        .collect()
    }

    fn ids(values: &[&str]) -> Vec<ActorId> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_two_shot_scene() {
        let a = Shot::new("Mara sprints across the market")
            .with_cast(&["actor1"])
            .with_duration("5s");
        let b = Shot::new("A vendor waves her down")
            .with_npc("a street vendor")
            .with_duration("6s");

        let compiled = compile(
            &[&a, &b],
            "Cinematic",
            &ids(&["actor1"]),
            AspectRatio::Widescreen,
            None,
            &registry(),
        )
        .unwrap();

        assert!(compiled.prompt.contains("[0s-5s]"));
        assert!(compiled.prompt.contains("[5s-11s]"));
        assert!(compiled
            .prompt
            .ends_with("[Technical Specs]\n--ar 16:9 --duration 15s --quality high"));
        assert_eq!(compiled.total_duration_seconds, 11.0);
        assert_eq!(compiled.technical_duration_seconds, 15);
        assert_eq!(
            compiled.primary_cast_reference.as_deref(),
            Some("https://cdn/mara.png")
        );
        assert!(compiled.prompt.contains("Featuring: Mara."));
        assert!(compiled.prompt.contains("NPC: a street vendor."));
        assert!(compiled.prompt.contains(TRANSITION_MARKER));
    }

    #[test]
    fn test_section_order() {
        let shot = Shot::new("x").with_cast(&["actor1"]);
        let compiled = compile(
            &[&shot],
            "Noir",
            &ids(&["actor1"]),
            AspectRatio::Square,
            Some(&SceneAnchor::new("A rain-soaked alley")),
            &registry(),
        )
        .unwrap();

        let positions: Vec<usize> = [
            SECTION_GLOBAL_CONTEXT,
            SECTION_MAIN_CAST,
            SECTION_TIMELINE,
            SECTION_TECHNICAL,
        ]
        .iter()
        .map(|section| compiled.prompt.find(section).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(compiled.prompt.contains("Environment: A rain-soaked alley"));
        assert!(compiled.prompt.contains("- Mara: wiry courier in a yellow raincoat (Voice: husky)"));
    }

    #[test]
    fn test_main_cast_omitted_when_unresolved() {
        let shot = Shot::new("x");
        let compiled = compile(
            &[&shot],
            "",
            &ids(&["ghost"]),
            AspectRatio::Square,
            None,
            &registry(),
        )
        .unwrap();
        assert!(!compiled.prompt.contains(SECTION_MAIN_CAST));
        assert!(compiled.primary_cast_reference.is_none());
    }

    #[test]
    fn test_policy_rejects_dense_short_form() {
        let shots: Vec<Shot> = (0..4).map(|i| Shot::new(format!("s{}", i)).with_duration("3s")).collect();
        let refs: Vec<&Shot> = shots.iter().collect();
        assert!(compile(&refs, "", &[], AspectRatio::Square, None, &registry()).is_none());
        assert!(check_policy(&refs).is_err());

        // Same count but long enough passes
        let long: Vec<Shot> = (0..4).map(|i| Shot::new(format!("s{}", i)).with_duration("4s")).collect();
        let refs: Vec<&Shot> = long.iter().collect();
        assert!(compile(&refs, "", &[], AspectRatio::Square, None, &registry()).is_some());
    }

    #[test]
    fn test_empty_selection_rejected() {
        assert!(compile(&[], "", &[], AspectRatio::Square, None, &registry()).is_none());
    }

    #[test]
    fn test_technical_duration_rounds_up() {
        let a = Shot::new("a").with_duration("10s");
        let b = Shot::new("b").with_duration("7000ms");
        let compiled = compile(&[&a, &b], "", &[], AspectRatio::Vertical, None, &registry()).unwrap();
        assert_eq!(compiled.technical_duration_seconds, 20);
        assert!(compiled.prompt.contains("[10s-17s]"));
    }

    #[test]
    fn test_primary_reference_skips_members_without_images() {
        let shot = Shot::new("x").with_cast(&["actor3", "actor2"]);
        let compiled = compile(
            &[&shot],
            "",
            &ids(&["actor3", "actor2"]),
            AspectRatio::Square,
            None,
            &registry(),
        )
        .unwrap();
        assert_eq!(
            compiled.primary_cast_reference.as_deref(),
            Some("https://cdn/ivo-sheet.png")
        );
    }

    #[test]
    fn test_audio_notation() {
        let dialogue = Shot::new("x").with_audio(AudioNote::Dialogue {
            speaker: Some("actor1".to_string()),
            line: "Not today.".to_string(),
        });
        let sfx = Shot::new("y").with_audio(AudioNote::SoundEffect {
            description: "distant thunder".to_string(),
        });
        let compiled =
            compile(&[&dialogue, &sfx], "", &[], AspectRatio::Square, None, &registry()).unwrap();
        assert!(compiled.prompt.contains("Audio: Mara says \"Not today.\""));
        assert!(compiled.prompt.contains("Audio: [distant thunder]"));
    }

    #[test]
    fn test_anchor_images_returned() {
        let anchor = SceneAnchor::new("Harbor").with_images(vec!["https://cdn/h1.png".to_string()]);
        let shot = Shot::new("x");
        let compiled = compile(&[&shot], "", &[], AspectRatio::Square, Some(&anchor), &registry()).unwrap();
        assert_eq!(compiled.scene_anchor_images, vec!["https://cdn/h1.png"]);
    }

    #[test]
    fn test_parse_technical_specs_roundtrip() {
        let shot = Shot::new("x").with_duration("12s");
        let compiled =
            compile(&[&shot], "", &[], AspectRatio::Anamorphic, None, &registry()).unwrap();
        let specs = parse_technical_specs(&compiled.prompt).unwrap();
        assert_eq!(specs.aspect_ratio, AspectRatio::Anamorphic);
        assert_eq!(specs.duration_seconds, 15);
        assert!(parse_technical_specs("no specs here").is_none());
    }
}
