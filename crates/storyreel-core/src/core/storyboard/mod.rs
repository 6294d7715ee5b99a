//! Storyboard
//!
//! Shots, actors and scene anchors, the reference selector, and the
//! copy-on-write store holding the storyboard state.

pub mod models;
pub mod references;
pub mod store;

pub use models::{
    Actor, ActorRegistry, AudioNote, GeneratedImage, SceneAnchor, Shot, Storyboard,
    DEFAULT_SHOT_DURATION,
};
pub use references::{select_references, ReferenceSet, MAX_REFERENCES};
pub use store::{StoryboardStore, STORYBOARD_KEY};
