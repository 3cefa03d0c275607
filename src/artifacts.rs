//! Persisted pipeline artifacts and the transcript cache.
//!
//! Each run keyed by the audio file's base name produces:
//!
//! - `<name>_transcript.txt` - the raw transcript
//! - `<name>_stories.txt` - stories rendered for reading
//! - `<name>_stories.json` - the structured story list
//!
//! The three files are written all-or-nothing. Transcripts are additionally
//! cached as soon as transcription finishes, so a run that fails later can be
//! retried without transcribing again.

use crate::error::{NarrataError, Result};
use crate::stories::{render_json, render_text, Story};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Locations of the three output artifacts for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub transcript: PathBuf,
    pub stories_text: PathBuf,
    pub stories_json: PathBuf,
}

impl ArtifactPaths {
    pub fn all(&self) -> [&Path; 3] {
        [&self.transcript, &self.stories_text, &self.stories_json]
    }
}

/// Reads and writes run artifacts under an output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    cache_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Key artifacts by the audio file's stem.
    pub fn base_name(audio_path: &Path) -> Result<String> {
        audio_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                NarrataError::InvalidInput(format!("Cannot derive a name from {}", audio_path.display()))
            })
    }

    pub fn paths(&self, name: &str) -> ArtifactPaths {
        ArtifactPaths {
            transcript: self.output_dir.join(format!("{}_transcript.txt", name)),
            stories_text: self.output_dir.join(format!("{}_stories.txt", name)),
            stories_json: self.output_dir.join(format!("{}_stories.json", name)),
        }
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}_transcript.txt", name))
    }

    /// A previously produced transcript for `name`, if any.
    ///
    /// The saved artifact wins over the cache entry.
    pub fn cached_transcript(&self, name: &str) -> Result<Option<String>> {
        for path in [self.paths(name).transcript, self.cache_path(name)] {
            if path.exists() {
                debug!("Found cached transcript at {}", path.display());
                return Ok(Some(std::fs::read_to_string(&path)?));
            }
        }
        Ok(None)
    }

    /// Remember a fresh transcript. Failure only costs a re-transcription later.
    pub fn cache_transcript(&self, name: &str, transcript: &str) {
        let path = self.cache_path(name);
        let result = std::fs::create_dir_all(&self.cache_dir)
            .and_then(|_| std::fs::write(&path, transcript));
        if let Err(e) = result {
            warn!("Failed to cache transcript at {}: {}", path.display(), e);
        }
    }

    /// Drop the cached transcript for `name` (artifact and cache entry).
    pub fn forget_transcript(&self, name: &str) -> Result<()> {
        for path in [self.paths(name).transcript, self.cache_path(name)] {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Write all three artifacts, or none of them.
    pub fn save(&self, name: &str, transcript: &str, stories: &[Story]) -> Result<ArtifactPaths> {
        info!("Saving results...");
        let paths = self.paths(name);

        let json = render_json(stories).map_err(|e| NarrataError::Persistence(e.to_string()))?;
        let contents = [
            (&paths.transcript, transcript.to_string()),
            (&paths.stories_text, render_text(stories)),
            (&paths.stories_json, json),
        ];

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            NarrataError::Persistence(format!("{}: {}", self.output_dir.display(), e))
        })?;

        // Stage everything first so a failure cannot leave half a batch behind.
        let mut staged = Vec::with_capacity(contents.len());
        for (path, content) in &contents {
            let mut file = tempfile::NamedTempFile::new_in(&self.output_dir)
                .map_err(|e| NarrataError::Persistence(format!("{}: {}", path.display(), e)))?;
            file.write_all(content.as_bytes())
                .and_then(|_| file.flush())
                .map_err(|e| NarrataError::Persistence(format!("{}: {}", path.display(), e)))?;
            staged.push((file, *path));
        }

        // Earlier artifacts move aside until the new batch is in place.
        let mut backups = Vec::new();
        for (_, path) in &staged {
            if !path.is_file() {
                continue;
            }
            let backup = tempfile::NamedTempFile::new_in(&self.output_dir)
                .map(|file| file.into_temp_path())
                .and_then(|backup| std::fs::rename(path, &backup).map(|_| backup));
            match backup {
                Ok(backup) => backups.push((backup, *path)),
                Err(e) => {
                    restore(&[], backups);
                    return Err(NarrataError::Persistence(format!("{}: {}", path.display(), e)));
                }
            }
        }

        let mut written: Vec<&PathBuf> = Vec::with_capacity(staged.len());
        for (file, path) in staged {
            if let Err(e) = file.persist(path) {
                restore(&written, backups);
                return Err(NarrataError::Persistence(format!("{}: {}", path.display(), e.error)));
            }
            written.push(path);
        }

        info!("Results saved to {}", self.output_dir.display());
        Ok(paths)
    }
}

/// Undo a partial save: drop the new files and put the earlier ones back.
fn restore(written: &[&PathBuf], backups: Vec<(tempfile::TempPath, &PathBuf)>) {
    for path in written {
        let _ = std::fs::remove_file(path);
    }
    for (backup, path) in backups {
        if let Err(e) = std::fs::rename(&backup, path) {
            warn!("Failed to restore {}: {}", path.display(), e);
        }
    }
}
