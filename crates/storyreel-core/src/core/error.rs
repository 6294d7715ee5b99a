//! StoryReel Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

use super::{SceneId, ShotId, VersionId};
use crate::core::generative::GenerationError;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Storyboard Errors
    // =========================================================================
    #[error("Shot not found: {0}")]
    ShotNotFound(ShotId),

    #[error("Scene not found: {0}")]
    SceneNotFound(SceneId),

    #[error("Version not found: {0}")]
    VersionNotFound(VersionId),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    // =========================================================================
    // Generation Errors
    // =========================================================================
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Failed to parse analysis output: {0}")]
    AnalysisParseFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    StorageError(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether this error came from a provider call rather than local state.
    pub fn is_generation(&self) -> bool {
        matches!(self, CoreError::Generation(_))
    }
}
