//! Generation Error Definitions

use thiserror::Error;

/// Failures of a single generation call.
///
/// Degraded-mode fallbacks (missing references, skipped compression) are
/// not errors and never surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// Missing base URL or API key, detected before any network I/O
    #[error("Provider not configured: {0}")]
    Configuration(String),

    /// Network failure or aborted request
    #[error("Transport error{}: {message}", timeout_suffix(.timed_out))]
    Transport { message: String, timed_out: bool },

    /// Non-success HTTP status or a job reported as failed
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Video job did not finish within the polling ceiling
    #[error("Video job still pending after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Success response without a recognizable payload
    #[error("Provider returned no usable output: {0}")]
    EmptyResponse(String),
}

fn timeout_suffix(timed_out: &bool) -> &'static str {
    if *timed_out {
        " (timed out)"
    } else {
        ""
    }
}

impl GenerationError {
    pub fn transport(error: &reqwest::Error) -> Self {
        GenerationError::Transport {
            message: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            GenerationError::Transport {
                timed_out: true,
                ..
            } | GenerationError::PollTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = GenerationError::Transport {
            message: "connection reset".to_string(),
            timed_out: true,
        };
        assert_eq!(err.to_string(), "Transport error (timed out): connection reset");

        let err = GenerationError::Provider {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "Provider error (429): rate limited");
        assert!(GenerationError::PollTimeout { attempts: 3 }.is_timeout());
    }
}
