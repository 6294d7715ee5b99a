//! Video Generation Types
//!
//! Parameters for scene video generation and the transient job state that
//! lives only inside one submit/poll call.

use serde::{Deserialize, Serialize};

use crate::core::{AspectRatio, MediaRef};

// =============================================================================
// Parameters
// =============================================================================

/// Parameters for video generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParams {
    /// Compiled multi-shot prompt
    pub prompt: String,
    /// Optional first frame
    pub start_frame: Option<MediaRef>,
    /// Target duration in seconds
    pub duration_seconds: u32,
    pub aspect_ratio: AspectRatio,
}

impl VideoParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            start_frame: None,
            duration_seconds: 5,
            aspect_ratio: AspectRatio::default(),
        }
    }

    pub fn with_start_frame(mut self, frame: impl Into<MediaRef>) -> Self {
        self.start_frame = Some(frame.into());
        self
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Prompt cannot be empty".to_string());
        }
        if self.duration_seconds == 0 {
            return Err("Duration must be positive".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Job State
// =============================================================================

/// Provider-reported job status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Maps a provider status string. Unknown values keep the job pending.
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "succeeded" | "success" | "done" | "finished" => {
                JobStatus::Succeeded
            }
            "failed" | "failure" | "error" | "cancelled" | "canceled" | "rejected" => {
                JobStatus::Failed
            }
            _ => JobStatus::Pending,
        }
    }
}

/// Asynchronous provider job, owned by a single generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJob {
    pub task_id: String,
    pub status: JobStatus,
    pub poll_count: u32,
}

impl VideoJob {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: JobStatus::Pending,
            poll_count: 0,
        }
    }
}

/// Completed video generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    pub video: MediaRef,
    /// Provider task id when the poll path was taken
    pub task_id: Option<String>,
    /// Status checks performed
    pub poll_count: u32,
}
