//! OpenAI-compatible chat completion backend
//!
//! Posts to `{api_base}/chat/completions`. Rate limiting (HTTP 429) is
//! retried with exponential backoff; every other failure is returned as is.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ChatError, ChatMessage, ChatModel};
use crate::config::{ChatConfig, credential};
use crate::error::{NeuralicError, Result};

/// Chat backend for OpenAI-compatible HTTP APIs
#[derive(Debug)]
pub struct OpenAiChat {
    client: Client,
    config: ChatConfig,
    api_key: String,
    initial_backoff: Duration,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    /// Create a backend reading the API key from `config.api_key_env`
    pub fn from_env(config: &ChatConfig) -> Result<Self> {
        let api_key = credential(&config.api_key_env)?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ChatConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NeuralicError::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "OpenAiChat initialized with model: {}, api_base: {}",
            config.model, config.api_base
        );

        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
            initial_backoff: Duration::from_secs(1),
        })
    }

    /// Override the first rate-limit backoff delay (doubles on each retry)
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> std::result::Result<String, ChatError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        debug!("Calling chat API at: {}", url);

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
        };

        let max_retries = self.config.max_retries;
        let mut delay = self.initial_backoff;
        let mut attempt = 0;

        loop {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| ChatError::Network(format!("Request failed: {e}")))?;

            let status = response.status();

            if status == 429 {
                if attempt >= max_retries {
                    return Err(ChatError::Api(format!(
                        "Rate limited after {max_retries} retries"
                    )));
                }
                attempt += 1;
                warn!(
                    "Rate limited on attempt {}/{}, waiting {:?}",
                    attempt, max_retries, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(ChatError::Api(format!(
                    "API returned {status}: {error_text}"
                )));
            }

            let completion: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|e| ChatError::Parse(e.to_string()))?;

            return completion
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| ChatError::Parse("Empty response".to_string()));
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
