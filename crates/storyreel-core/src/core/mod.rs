//! StoryReel Core Engine
//!
//! Core orchestration module.
//! Handles prompt compilation, reference selection, version history and
//! provider adaptation for every generation kind.

pub mod analysis;
pub mod assets;
pub mod fs;
pub mod generative;
pub mod prompt;
pub mod settings;
pub mod storage;
pub mod storyboard;
pub mod studio;
pub mod versions;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
