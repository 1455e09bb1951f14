//! Wellness advice layered on top of a predicted score.

pub mod advisor;
pub mod gemini;
pub mod prompt;
pub mod tips;

pub use advisor::{
    Advice, AdviceSource, WellnessAdvisor, OFFLINE_SUMMARY_PLACEHOLDER, SUMMARY_FAILED,
};
pub use gemini::{GeminiClient, GeminiError};
pub use prompt::{suggestion_prompt, summary_prompt};
pub use tips::{fallback_suggestions, ScoreBand};
