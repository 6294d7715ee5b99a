//! Reference Selector
//!
//! Decides which images accompany an image-generation request for a shot.

use crate::core::MediaRef;

use super::models::{ActorRegistry, SceneAnchor, Shot};

/// Upper bound on references sent with one request
pub const MAX_REFERENCES: usize = 5;

/// Selects reference images for a shot.
///
/// With main cast: one portrait (character sheet fallback) per resolvable
/// member in listed order, then the scene-anchor images. Without main cast:
/// exactly the anchor images. NPCs never contribute imagery. At most
/// [`MAX_REFERENCES`] entries.
pub fn select_references(
    shot: &Shot,
    actors: &ActorRegistry,
    anchor: Option<&SceneAnchor>,
) -> Vec<MediaRef> {
    let cast = actors
        .resolve(&shot.main_cast_ids)
        .filter_map(|actor| actor.reference_image().cloned());
    let anchor_images = anchor.into_iter().flat_map(|a| a.images.iter().cloned());

    cast.chain(anchor_images).take(MAX_REFERENCES).collect()
}

/// References split into the primary image and the rest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    pub primary: Option<MediaRef>,
    pub secondary: Vec<MediaRef>,
}

impl ReferenceSet {
    pub fn split(mut references: Vec<MediaRef>) -> Self {
        if references.is_empty() {
            return Self::default();
        }
        let primary = references.remove(0);
        Self {
            primary: Some(primary),
            secondary: references,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_empty()
    }
}
