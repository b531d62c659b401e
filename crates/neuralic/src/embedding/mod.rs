//! Embedding providers
//!
//! Turns text into the fixed-length vectors stored in the index. The
//! provider is an external service; this module only defines the seam and
//! an OpenAI-compatible client.

mod openai;

use async_trait::async_trait;

pub use openai::OpenAiEmbeddings;

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Embedding provider errors
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
