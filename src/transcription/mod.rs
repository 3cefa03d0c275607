//! Transcription module for Narrata.
//!
//! Turns an audio file into plain text through one of two backends:
//!
//! - **Local**: runs a speech-to-text model through its command-line tool.
//! - **Remote**: uploads the audio to an HTTPS transcription API.
//!
//! The [`TranscriptionAdapter`] wraps whichever backend is configured and
//! serializes access to it.

mod adapter;
mod local;
mod remote;

pub use adapter::TranscriptionAdapter;
pub use local::LocalTranscriber;
pub use remote::{RemoteTranscriber, TranscriptionResponse};

use crate::config::{TranscriptionProvider, TranscriptionSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file to plain text.
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;

    /// Backend name, for logging.
    fn name(&self) -> &str;
}

/// Create the backend selected by the settings.
pub fn create_transcriber(settings: &TranscriptionSettings) -> Result<Arc<dyn Transcriber>> {
    Ok(match settings.provider {
        TranscriptionProvider::Local => Arc::new(LocalTranscriber::new(&settings.local)),
        TranscriptionProvider::Remote => Arc::new(RemoteTranscriber::new(&settings.remote)?),
    })
}
