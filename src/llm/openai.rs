//! OpenAI-compatible chat backend.

use super::{ChatModel, ChatRequest, Role};
use crate::config::LlmSettings;
use crate::error::{NarrataError, Result};
use crate::openai::create_client;
use crate::stories::truncate_chars;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument};

/// Chat model backed by an OpenAI-compatible API.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    stream: bool,
}

impl OpenAIChatModel {
    /// Create a chat model from settings.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
            model: settings.model.clone(),
            stream: settings.stream,
        })
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> Result<CreateChatCompletionRequest> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            let built: ChatCompletionRequestMessage = match message.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| NarrataError::OpenAI(e.to_string()))?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| NarrataError::OpenAI(e.to_string()))?
                    .into(),
            };
            messages.push(built);
        }

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(request.temperature)
            .stream(stream)
            .build()
            .map_err(|e| NarrataError::OpenAI(e.to_string()))
    }

    async fn complete_once(&self, request: &ChatRequest) -> Result<String> {
        let request = self.build_request(request, false)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| NarrataError::OpenAI(format!("Chat completion failed: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| NarrataError::OpenAI("Empty response from LLM".to_string()))
    }

    async fn complete_streamed(&self, request: &ChatRequest) -> Result<String> {
        let request = self.build_request(request, true)?;

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| NarrataError::OpenAI(format!("Chat stream failed: {}", e)))?;

        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| NarrataError::OpenAI(format!("Chat stream failed: {}", e)))?;
            for choice in chunk.choices {
                if let Some(delta) = choice.delta.content {
                    text.push_str(&delta);
                }
            }
        }

        if text.is_empty() {
            return Err(NarrataError::OpenAI("Empty response from LLM".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, request), fields(model = %self.model, stream = self.stream))]
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let text = if self.stream {
            self.complete_streamed(&request).await?
        } else {
            self.complete_once(&request).await?
        };
        debug!("LLM response: {}", preview(&text, 300));
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// First `max_chars` characters of `text`, char-boundary safe.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let head = truncate_chars(text, max_chars);
    if head.len() < text.len() {
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
