//! Serialized access to a transcription backend.

use super::Transcriber;
use crate::error::{NarrataError, Result};
use crate::llm::preview;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

/// Wraps a backend so only one transcription runs against it at a time.
///
/// The permit belongs to this adapter (and its clones), not to the process:
/// two adapters over two backends do not block each other.
#[derive(Clone)]
pub struct TranscriptionAdapter {
    backend: Arc<dyn Transcriber>,
    permit: Arc<Semaphore>,
}

impl TranscriptionAdapter {
    pub fn new(backend: Arc<dyn Transcriber>) -> Self {
        Self {
            backend,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Transcribe `audio_path`, waiting for any in-flight transcription first.
    pub async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let _permit = self
            .permit
            .acquire()
            .await
            .map_err(|e| NarrataError::Transcription(format!("Transcriber unavailable: {}", e)))?;

        info!("Transcribing audio with {} backend...", self.backend.name());
        let text = self.backend.transcribe(audio_path).await?;
        info!("Transcription complete, preview:\n{}", preview(&text, 200));
        Ok(text)
    }
}
