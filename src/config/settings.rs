//! Configuration settings for Narrata.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub transcription: TranscriptionSettings,
    pub segmentation: SegmentationSettings,
    pub generation: GenerationSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory where pipeline artifacts are written.
    pub output_dir: String,
    /// Directory for cached transcripts.
    pub cache_dir: String,
    /// Directory holding one sub-directory per project.
    pub projects_dir: String,
    /// Log level used when no -v flag is given (trace, debug, info, warn, error).
    pub log_level: String,
    /// Optional file that receives a copy of the log output.
    pub log_file: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            cache_dir: "~/.narrata/cache".to_string(),
            projects_dir: "~/.narrata/projects".to_string(),
            log_level: "warn".to_string(),
            log_file: None,
        }
    }
}

/// Chat-completion backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Model name sent with every request.
    pub model: String,
    /// Base URL of an OpenAI-compatible API. None = api.openai.com.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Use streamed completions.
    pub stream: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 300,
            stream: false,
        }
    }
}

impl LlmSettings {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

/// Transcription provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// Local speech-to-text model run through its command-line tool.
    #[default]
    Local,
    /// Remote HTTPS transcription API.
    Remote,
}

impl std::str::FromStr for TranscriptionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "whisper" => Ok(TranscriptionProvider::Local),
            "remote" | "api" => Ok(TranscriptionProvider::Remote),
            _ => Err(format!("Unknown transcription provider: {}", s)),
        }
    }
}

impl std::fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionProvider::Local => write!(f, "local"),
            TranscriptionProvider::Remote => write!(f, "remote"),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Which backend to use.
    pub provider: TranscriptionProvider,
    pub local: LocalTranscriptionSettings,
    pub remote: RemoteTranscriptionSettings,
}

/// Settings for the local model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalTranscriptionSettings {
    /// Command that runs the model.
    pub command: String,
    /// Model size passed to the command.
    pub model: String,
    /// Optional language hint.
    pub language: Option<String>,
}

impl Default for LocalTranscriptionSettings {
    fn default() -> Self {
        Self {
            command: "whisper".to_string(),
            model: "small".to_string(),
            language: None,
        }
    }
}

/// Settings for the remote API backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteTranscriptionSettings {
    /// Transcription endpoint accepting multipart uploads.
    pub endpoint: String,
    /// Model name sent in the form.
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
}

impl Default for RemoteTranscriptionSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.stepfun.com/v1/audio/transcriptions".to_string(),
            model: "step-asr".to_string(),
            api_key_env: "STEP_API_KEY".to_string(),
        }
    }
}

/// Story segmentation stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Maximum transcript characters sent to the model.
    pub max_text_length: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Total attempts before giving up.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay_seconds: u64,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            max_text_length: 3000,
            temperature: 0.1,
            max_retries: 3,
            retry_delay_seconds: 2,
        }
    }
}

impl SegmentationSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

/// Story generation stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Sampling temperature.
    pub temperature: f32,
    /// Attempts per story before it is dropped.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay_seconds: u64,
    /// Maximum generation requests in flight.
    pub max_concurrent: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_retries: 3,
            retry_delay_seconds: 2,
            max_concurrent: 8,
        }
    }
}

impl GenerationSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::NarrataError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("narrata")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.cache_dir)
    }

    pub fn projects_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.projects_dir)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.general.log_file.as_deref().map(Self::expand_path)
    }
}
