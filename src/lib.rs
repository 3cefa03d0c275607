//! Narrata - stories from recorded narration
//!
//! Turns a spoken recording into a set of written stories: the audio is
//! transcribed, an LLM finds the distinct stories the narrator tells, and each
//! one is expanded into its own piece of prose.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `transcription` - Speech-to-text backends behind the `Transcriber` trait
//! - `llm` - Chat-completion backends behind the `ChatModel` trait
//! - `stories` - Response parsing, segmentation and generation stages
//! - `artifacts` - Persisted run output and the transcript cache
//! - `project` - Multi-recording projects and their memos
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use narrata::config::Settings;
//! use narrata::orchestrator::Pipeline;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(&settings)?;
//!
//!     let outcome = pipeline.process_audio(Path::new("interview.mp3"), false).await?;
//!     println!("Wrote {} stories", outcome.stories.len());
//!
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod project;
pub mod stories;
pub mod transcription;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{NarrataError, Result};
