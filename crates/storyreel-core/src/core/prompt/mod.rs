//! Prompt Compilation
//!
//! Duration parsing and the multi-shot prompt compiler.

pub mod compiler;
pub mod duration;

pub use compiler::{check_policy, compile, parse_technical_specs, CompiledPrompt, TechnicalSpecs};
pub use duration::{format_seconds, parse_duration, round_up_to_step, total_seconds};
