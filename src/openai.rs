//! OpenAI-compatible client configuration.

use crate::config::LlmSettings;
use crate::error::{NarrataError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create a chat client from the LLM settings.
///
/// The API key is read from the configured environment variable; a custom
/// base URL points the client at any OpenAI-compatible provider.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let mut config = OpenAIConfig::new();
    if let Some(key) = settings.api_key() {
        config = config.with_api_key(key);
    }
    if let Some(base) = settings.base_url.as_deref().filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }

    create_client_with_timeout(config, settings.timeout())
}

/// Create a client with an explicit request timeout.
pub fn create_client_with_timeout(
    config: OpenAIConfig,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NarrataError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(config).with_http_client(http_client))
}
