//! OpenAI-compatible embedding provider
//!
//! Calls `POST {api_base}/embeddings` with a bearer token read from the
//! environment variable named in the config.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::{EmbeddingConfig, credential};
use crate::error::{NeuralicError, Result};

/// Embedding provider for OpenAI-compatible HTTP APIs
#[derive(Debug)]
pub struct OpenAiEmbeddings {
    client: Client,
    config: EmbeddingConfig,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    /// Create a provider reading the API key from `config.api_key_env`
    pub fn from_env(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = credential(&config.api_key_env)?;
        Self::new(config, api_key)
    }

    /// Create a provider with an explicit API key
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NeuralicError::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "OpenAiEmbeddings initialized with model: {}, api_base: {}",
            config.model, config.api_base
        );

        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.config.api_base.trim_end_matches('/'));
        debug!("Requesting embedding from: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Network(format!("Request timed out: {e}"))
                } else {
                    EmbeddingError::Network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EmbeddingError::Api(format!(
                "API returned {status}: {error_text}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Parse("No embedding returned".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.config.dimension
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
