//! Story extraction and generation.
//!
//! Two LLM stages sit at the heart of Narrata:
//!
//! - [`Segmenter`] splits a transcript into [`StoryInfo`] records, enforcing a
//!   JSON contract on an unstructured model answer via the [`parser`].
//! - [`Generator`] expands every record into prose concurrently, isolating
//!   per-story failures and re-sorting the results by id.

mod generate;
mod model;
pub mod parser;
mod render;
mod segment;

pub use generate::Generator;
pub use model::{GenerationReport, Story, StoryInfo};
pub use parser::{ParseError, ParsedBatch};
pub use render::{render_json, render_text, STORY_DELIMITER};
pub use segment::{truncate_chars, Segmenter};
