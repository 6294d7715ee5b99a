//! Scene Versions
//!
//! Scenes, their immutable versions, and the ledger transitions between the
//! live draft and saved versions.

pub mod ledger;
pub mod models;

pub use ledger::{
    begin_generation, complete_generation, create_scene, delete_scene, edit_draft, generate, navigate,
    recompose, refresh_scenes, save, set_shots, GenerationTicket, NewScene,
};
pub use models::{ActiveVersion, Direction, Scene, Version, VersionAssets, VersionKind};
