//! StoryReel Core Library
//!
//! Orchestration engine for AI-assisted film storyboarding.
//! Turns shot lists, a character roster and scene-reference assets into
//! provider-agnostic generation requests, and compiles multi-shot prompts
//! for long-form video generation.
//!
//! The library owns no display logic, files or sockets of its own beyond the
//! provider HTTP client: persistence is injected through the
//! [`core::storage`] traits, and a presentation layer observes the
//! [`core::storyboard::Storyboard`] state container.

pub mod core;

pub use crate::core::{CoreError, CoreResult};
