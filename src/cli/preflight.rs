//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and credentials are available
//! before starting operations that would otherwise fail midway.

use crate::config::{Settings, TranscriptionProvider};
use crate::error::{NarrataError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Full pipeline: transcription backend and LLM.
    Process,
    /// Segmentation or memo generation: LLM only.
    Segment,
    /// Transcription only.
    Transcribe,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Process => {
            check_transcription(settings)?;
            check_api_key(&settings.llm.api_key_env)?;
        }
        Operation::Segment => {
            check_api_key(&settings.llm.api_key_env)?;
        }
        Operation::Transcribe => {
            check_transcription(settings)?;
        }
    }
    Ok(())
}

fn check_transcription(settings: &Settings) -> Result<()> {
    match settings.transcription.provider {
        TranscriptionProvider::Local => check_tool(&settings.transcription.local.command),
        TranscriptionProvider::Remote => check_api_key(&settings.transcription.remote.api_key_env),
    }
}

/// Check that an API key environment variable is set and non-empty.
fn check_api_key(var: &str) -> Result<()> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(NarrataError::Config(format!(
            "{var} is empty. Set it with: export {var}='...'"
        ))),
        Err(_) => Err(NarrataError::Config(format!(
            "{var} not set. Set it with: export {var}='...'"
        ))),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--help").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(NarrataError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(NarrataError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(NarrataError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
