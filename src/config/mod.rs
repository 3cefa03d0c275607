//! Configuration module for Narrata.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{GenerationPrompts, Prompts, SegmentationPrompts};
pub use settings::{
    GeneralSettings, GenerationSettings, LlmSettings, LocalTranscriptionSettings,
    PromptSettings, RemoteTranscriptionSettings, SegmentationSettings, Settings,
    TranscriptionProvider, TranscriptionSettings,
};
