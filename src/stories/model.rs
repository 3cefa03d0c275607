//! Story data model.

use serde::{Deserialize, Serialize};

/// Metadata for one narrative unit found in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryInfo {
    /// Positive id, unique within a batch. Defines canonical ordering.
    pub story_id: u32,
    /// Short, neutrally phrased title.
    pub story_title: String,
    /// Time descriptor, exact or deliberately vague.
    pub story_time: String,
    /// De-duplicated list of significant characters.
    pub characters: Vec<String>,
    /// Conflict origin, turning point and resolution.
    pub summary: String,
}

impl StoryInfo {
    /// Characters joined for prompts and headers.
    pub fn characters_joined(&self) -> String {
        self.characters.join(", ")
    }
}

/// A story with its generated prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub info: StoryInfo,
    pub content: String,
}

impl Story {
    pub fn new(info: StoryInfo, content: String) -> Self {
        Self { info, content }
    }

    pub fn id(&self) -> u32 {
        self.info.story_id
    }
}

/// Outcome of the generation stage.
///
/// `dropped` lists the ids whose generation exhausted its retries, so callers
/// can tell "all succeeded" apart from "some were left out".
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Generated stories, ascending by id.
    pub stories: Vec<Story>,
    /// Ids that were dropped, ascending.
    pub dropped: Vec<u32>,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}
