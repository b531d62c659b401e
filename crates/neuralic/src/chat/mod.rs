//! Chat completion and memory-aware conversation
//!
//! `ChatModel` is the seam to the language model; `ChatOrchestrator` wraps
//! it with retrieval before and remembering after every turn.

mod openai;
mod orchestrator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiChat;
pub use orchestrator::{ChatOrchestrator, ChatReply};

/// One message of a chat prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for chat completion backends
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the conversation, returning the assistant's reply text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Chat completion errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat API error: {0}")]
    Api(String),
    #[error("Chat network error: {0}")]
    Network(String),
    #[error("Chat parse error: {0}")]
    Parse(String),
    #[error("Chat configuration error: {0}")]
    Config(String),
}
