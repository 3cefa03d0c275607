//! Project storage.
//!
//! A project groups the recordings of one narrator together with their
//! transcripts, the generated memo, and a small status map used to keep two
//! memo generations from running against the same project.

mod fs;

pub use fs::FsProjectStore;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Status key set while a memo generation runs.
pub const STATUS_GENERATING: &str = "generating";
/// Status key holding the outcome of the last memo generation.
pub const STATUS_LAST_RUN: &str = "last_run";

/// Processing state of one uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Uploaded, ready to be transcribed.
    #[default]
    Ready,
    /// Transcription in progress.
    Transcribing,
    /// Transcript available.
    Transcribed,
    /// Last transcription attempt failed.
    Failed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Ready => write!(f, "ready"),
            FileStatus::Transcribing => write!(f, "transcribing"),
            FileStatus::Transcribed => write!(f, "transcribed"),
            FileStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An uploaded recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Original file name.
    pub name: String,
    #[serde(default)]
    pub status: FileStatus,
    /// Upload time; orders files within a project.
    pub added_at: DateTime<Utc>,
}

/// Persisted project metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    /// Person telling the stories, if known.
    #[serde(default)]
    pub narrator: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: BTreeMap<String, String>,
    #[serde(default)]
    pub files: BTreeMap<String, ProjectFile>,
    /// Project directory; filled in on load.
    #[serde(skip)]
    pub path: PathBuf,
}

impl ProjectRecord {
    /// Whether a memo generation is marked as running.
    pub fn is_generating(&self) -> bool {
        self.status.get(STATUS_GENERATING).is_some_and(|v| v == "1")
    }

    /// File ids in upload order.
    pub fn file_ids_in_order(&self) -> Vec<String> {
        let mut files: Vec<(&String, &ProjectFile)> = self.files.iter().collect();
        files.sort_by(|a, b| a.1.added_at.cmp(&b.1.added_at).then_with(|| a.0.cmp(b.0)));
        files.into_iter().map(|(id, _)| id.clone()).collect()
    }
}

/// Storage interface for projects.
pub trait ProjectStore: Send + Sync {
    /// Create a project and return its record.
    fn create(&self, name: &str, narrator: Option<&str>) -> Result<ProjectRecord>;

    /// Load one project.
    fn load(&self, id: &str) -> Result<ProjectRecord>;

    /// All projects, oldest first.
    fn list_all(&self) -> Result<Vec<ProjectRecord>>;

    /// Change a project's display name and narrator.
    fn rename(&self, id: &str, name: &str, narrator: Option<&str>) -> Result<ProjectRecord>;

    /// Remove a project and everything in it.
    fn delete(&self, id: &str) -> Result<()>;

    /// Store an uploaded file and return its id.
    fn add_file(&self, id: &str, file_name: &str, data: &[u8]) -> Result<String>;

    /// Remove a file and its transcript.
    fn delete_file(&self, id: &str, file_id: &str) -> Result<()>;

    /// Update a file's processing state.
    fn set_file_status(&self, id: &str, file_id: &str, status: FileStatus) -> Result<()>;

    /// Path of a stored audio file.
    fn audio_path(&self, id: &str, file_id: &str) -> Result<PathBuf>;

    /// Set a status value. An empty value removes the key.
    fn set_status(&self, id: &str, key: &str, value: &str) -> Result<()>;

    /// Read a status value.
    fn status(&self, id: &str, key: &str) -> Result<Option<String>>;

    fn read_transcript(&self, id: &str, file_id: &str) -> Result<Option<String>>;

    fn write_transcript(&self, id: &str, file_id: &str, text: &str) -> Result<()>;

    fn read_memo(&self, id: &str) -> Result<Option<String>>;

    fn write_memo(&self, id: &str, memo: &str) -> Result<()>;

    /// Clear the generation flag and mark every file ready again.
    fn reset(&self, id: &str) -> Result<()>;
}
