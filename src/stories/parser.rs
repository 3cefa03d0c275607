//! Structured response parser.
//!
//! Pulls the segmentation JSON out of a free-form model response and turns it
//! into validated [`StoryInfo`] records. Models answer either with a fenced
//! ```` ```json ```` block (often wrapped in prose) or with bare JSON; both are
//! accepted and yield identical results.

use super::StoryInfo;
use crate::error::NarrataError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

/// Fields every story record must carry.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "story_id",
    "story_title",
    "story_time",
    "characters",
    "summary",
];

/// Marker the model uses when the input holds no narrative.
pub const NON_STORY_MARKER: &str = "NON_STORY_CONTENT";

/// Raw story records extracted from one response, before typing.
pub type ParsedBatch = Vec<Map<String, Value>>;

/// Parser failures. All of them are recoverable by re-asking the model,
/// except [`ParseError::NonStoryContent`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("story {index} is missing fields: {}", fields.join(", "))]
    MissingFields { index: usize, fields: Vec<String> },

    #[error("input contains no narrative content")]
    NonStoryContent,
}

impl From<ParseError> for NarrataError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::MalformedJson(msg) => NarrataError::MalformedJson(msg),
            ParseError::InvalidSchema(msg) => NarrataError::InvalidSchema(msg),
            ParseError::MissingFields { index, fields } => NarrataError::MissingFields { index, fields },
            ParseError::NonStoryContent => NarrataError::NonStoryContent,
        }
    }
}

fn fenced_json_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?si)```json[ \t]*\r?\n(.*?)```").expect("fenced block pattern is valid")
    })
}

/// Extract the JSON text: the first fenced json block, else the whole response.
pub fn extract_json(response: &str) -> &str {
    match fenced_json_block().captures(response).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => response.trim(),
    }
}

/// Parse a segmentation response into raw story records.
///
/// Pure function over text. Extra fields on a record are kept but ignored
/// downstream.
pub fn parse(response: &str) -> Result<ParsedBatch, ParseError> {
    let json_str = extract_json(response);

    let value: Value = serde_json::from_str(json_str).map_err(|e| {
        ParseError::MalformedJson(format!("{} (response began: {:?})", e, head(response, 120)))
    })?;

    let object = value
        .as_object()
        .ok_or_else(|| ParseError::InvalidSchema("top-level value is not an object".to_string()))?;

    let flagged_non_story = object
        .get("error")
        .and_then(Value::as_str)
        .is_some_and(|e| e == NON_STORY_MARKER);

    let stories = match object.get("stories") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ParseError::InvalidSchema("'stories' is not an array".to_string()));
        }
        None if flagged_non_story => return Err(ParseError::NonStoryContent),
        None => return Err(ParseError::InvalidSchema("missing 'stories' key".to_string())),
    };

    if stories.is_empty() && flagged_non_story {
        return Err(ParseError::NonStoryContent);
    }

    let mut batch = Vec::with_capacity(stories.len());
    for (index, item) in stories.iter().enumerate() {
        let record = item.as_object().ok_or_else(|| {
            ParseError::InvalidSchema(format!("story {} is not an object", index))
        })?;

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !record.contains_key(**f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ParseError::MissingFields { index, fields: missing });
        }

        batch.push(record.clone());
    }

    Ok(batch)
}

/// Convert raw records into typed story metadata.
///
/// Rejects wrongly typed fields, non-positive ids and duplicate ids.
pub fn into_story_infos(batch: ParsedBatch) -> Result<Vec<StoryInfo>, ParseError> {
    let mut seen = HashSet::with_capacity(batch.len());
    let mut infos = Vec::with_capacity(batch.len());

    for (index, record) in batch.iter().enumerate() {
        let info = StoryInfo {
            story_id: story_id(record, index)?,
            story_title: string_field(record, "story_title", index)?,
            story_time: string_field(record, "story_time", index)?,
            characters: characters(record, index)?,
            summary: string_field(record, "summary", index)?,
        };

        if !seen.insert(info.story_id) {
            return Err(ParseError::InvalidSchema(format!(
                "duplicate story_id {} at story {}",
                info.story_id, index
            )));
        }
        infos.push(info);
    }

    Ok(infos)
}

/// Parse and validate in one step.
pub fn parse_story_infos(response: &str) -> Result<Vec<StoryInfo>, ParseError> {
    into_story_infos(parse(response)?)
}

fn story_id(record: &Map<String, Value>, index: usize) -> Result<u32, ParseError> {
    let raw = &record["story_id"];
    // Some models quote numbers.
    let id = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match id.and_then(|id| u32::try_from(id).ok()) {
        Some(id) if id > 0 => Ok(id),
        _ => Err(ParseError::InvalidSchema(format!(
            "story {} has invalid story_id {}",
            index, raw
        ))),
    }
}

fn string_field(record: &Map<String, Value>, field: &str, index: usize) -> Result<String, ParseError> {
    match &record[field] {
        Value::String(s) => Ok(s.clone()),
        other => Err(ParseError::InvalidSchema(format!(
            "story {} field '{}' must be a string, got {}",
            index, field, other
        ))),
    }
}

fn characters(record: &Map<String, Value>, index: usize) -> Result<Vec<String>, ParseError> {
    let items = record["characters"].as_array().ok_or_else(|| {
        ParseError::InvalidSchema(format!("story {} field 'characters' must be an array", index))
    })?;

    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let name = item.as_str().ok_or_else(|| {
            ParseError::InvalidSchema(format!("story {} has a non-string character", index))
        })?;
        if !name.trim().is_empty() && seen.insert(name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn head(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
