//! Remote transcription API backend.
//!
//! Uploads audio as multipart form data (`file`, `model`, `response_format`)
//! with a bearer token and reads `{"text": "..."}` back. The HTTP client has
//! no timeout: long recordings take as long as they take.

use super::Transcriber;
use crate::config::RemoteTranscriptionSettings;
use crate::error::{NarrataError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, instrument};

/// Body returned by the transcription endpoint.
#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// Transcriber backed by a remote HTTPS API.
pub struct RemoteTranscriber {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl RemoteTranscriber {
    pub fn new(settings: &RemoteTranscriptionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| NarrataError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key: std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty()),
        })
    }

    fn mime_for(audio_path: &Path) -> &'static str {
        match audio_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("wav") => "audio/wav",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") | Some("opus") => "audio/ogg",
            Some("webm") => "audio/webm",
            _ => "audio/mpeg",
        }
    }

    /// Parse the endpoint's JSON body into transcript text.
    pub fn parse_response(body: &str) -> Result<String> {
        let response: TranscriptionResponse = serde_json::from_str(body).map_err(|e| {
            NarrataError::Transcription(format!("Unexpected transcription response: {}", e))
        })?;
        Ok(response.text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for RemoteTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display(), model = %self.model))]
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio_path).await.map_err(|e| {
            NarrataError::Transcription(format!("Cannot read {}: {}", audio_path.display(), e))
        })?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        debug!("Uploading {} bytes to {}", bytes.len(), self.endpoint);

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(Self::mime_for(audio_path))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NarrataError::Transcription(format!("Transcription request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NarrataError::Transcription(format!(
                "Transcription API returned {}: {}",
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        Self::parse_response(&body)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
