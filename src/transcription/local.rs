//! Local speech-to-text backend.
//!
//! Runs the model's command-line tool (`whisper` by default) on the audio file
//! and reads back the plain-text transcript it writes.

use super::Transcriber;
use crate::config::LocalTranscriptionSettings;
use crate::error::{NarrataError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Transcriber backed by a locally installed model.
pub struct LocalTranscriber {
    command: String,
    model: String,
    language: Option<String>,
}

impl LocalTranscriber {
    pub fn new(settings: &LocalTranscriptionSettings) -> Self {
        Self {
            command: settings.command.clone(),
            model: settings.model.clone(),
            language: settings.language.clone(),
        }
    }

    /// Command-line arguments for one run.
    fn args(&self, audio_path: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            audio_path.to_string_lossy().to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--output_format".to_string(),
            "txt".to_string(),
            "--output_dir".to_string(),
            output_dir.to_string_lossy().to_string(),
            "--fp16".to_string(),
            "False".to_string(),
        ];
        if let Some(lang) = &self.language {
            args.push("--language".to_string());
            args.push(lang.clone());
        }
        args
    }

    /// Where the tool writes the transcript for `audio_path`.
    fn transcript_path(audio_path: &Path, output_dir: &Path) -> PathBuf {
        let stem = audio_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        output_dir.join(format!("{}.txt", stem))
    }
}

#[async_trait]
impl Transcriber for LocalTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display(), model = %self.model))]
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        if !audio_path.exists() {
            return Err(NarrataError::Transcription(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }

        let temp_dir = tempfile::tempdir()?;
        debug!("Running {} with model {}", self.command, self.model);

        let output = tokio::process::Command::new(&self.command)
            .args(self.args(audio_path, temp_dir.path()))
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    NarrataError::ToolNotFound(self.command.clone())
                } else {
                    NarrataError::Transcription(format!("Failed to run {}: {}", self.command, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NarrataError::ToolFailed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let transcript_path = Self::transcript_path(audio_path, temp_dir.path());
        let text = tokio::fs::read_to_string(&transcript_path).await.map_err(|e| {
            NarrataError::Transcription(format!(
                "{} produced no transcript at {}: {}",
                self.command,
                transcript_path.display(),
                e
            ))
        })?;

        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "local"
    }
}
