//! Error types for Narrata.

use thiserror::Error;

/// Library-level error type for Narrata operations.
#[derive(Error, Debug)]
pub enum NarrataError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Malformed JSON in model response: {0}")]
    MalformedJson(String),

    #[error("Invalid response schema: {0}")]
    InvalidSchema(String),

    #[error("Story {index} is missing fields: {}", fields.join(", "))]
    MissingFields { index: usize, fields: Vec<String> },

    #[error("Input contains no narrative content")]
    NonStoryContent,

    #[error("Story segmentation failed after {attempts} attempt(s): {reason}")]
    Segmentation { attempts: u32, reason: String },

    #[error("Generation failed for story {story_id}: {reason}")]
    Generation { story_id: u32, reason: String },

    #[error("Failed to persist artifacts: {0}")]
    Persistence(String),

    #[error("Project error: {0}")]
    Project(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("A memo generation is already running for project {0}")]
    AlreadyRunning(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl NarrataError {
    /// Whether this error came out of the structured response parser.
    ///
    /// Parse failures are retried by the stage that issued the LLM call.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            NarrataError::MalformedJson(_)
                | NarrataError::InvalidSchema(_)
                | NarrataError::MissingFields { .. }
        )
    }
}

/// Result type alias for Narrata operations.
pub type Result<T> = std::result::Result<T, NarrataError>;
