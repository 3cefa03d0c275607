//! Chat-completion backend abstraction.
//!
//! The story stages only ever need "send these messages, give me the text
//! back", so the seam is a single async trait. The production implementation
//! talks to any OpenAI-compatible API.

mod openai;

pub use openai::OpenAIChatModel;
pub(crate) use openai::preview;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

impl ChatRequest {
    /// The common system + user shape used by both story stages.
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Trait for chat-completion backends.
///
/// Implementations hold no per-call mutable state, so one instance is shared
/// by every concurrent request of a run.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the request and return the full response text.
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
