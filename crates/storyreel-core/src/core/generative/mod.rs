//! Generative AI Integration
//!
//! Provider-agnostic generation requests (analysis, image, speech, sound
//! effect, video) and the HTTP adapter that speaks each provider dialect.

pub mod adapter;
pub mod analysis;
pub mod audio;
pub mod error;
pub mod image;
pub mod media;
pub mod provider_impls;
pub mod providers;
pub mod shapes;
pub mod video;

// Re-export main types
pub use adapter::ProviderAdapter;
pub use analysis::AnalysisParams;
pub use audio::{SoundEffectParams, SpeechParams, Voice};
pub use error::GenerationError;
pub use image::{ImageParams, DEFAULT_STRENGTH};
pub use media::{ImagePayload, MediaResolver};
pub use provider_impls::{dialect_for, WireDialect, WireRequest};
pub use providers::{
    GenerationOutput, GenerationRequest, GenerativeProvider, MockGenerativeProvider, ProviderFamily,
    ProviderKind,
};
pub use video::{JobStatus, VideoJob, VideoParams, VideoResult};
