//! Vector index backends
//!
//! The index stores `(id, vector, metadata)` entries and answers
//! nearest-neighbour queries. Owner scoping is NOT trusted to the index:
//! callers post-filter whatever comes back.

pub mod in_memory;
pub mod pinecone;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::error::{NeuralicError, Result};

pub use in_memory::InMemoryIndex;
pub use pinecone::{IndexDescription, PineconeControlPlane, PineconeIndex, provision_index};

/// Opaque metadata stored alongside each vector
pub type Metadata = serde_json::Map<String, Value>;

/// An entry written to the index
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Metadata,
}

/// A ranked query hit
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub id: String,
    /// Similarity score, higher is closer
    pub score: f32,
    pub metadata: Metadata,
}

/// Trait for vector index backends
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace an entry
    async fn upsert(&self, entry: IndexEntry) -> std::result::Result<(), IndexError>;

    /// Return up to `top_k` entries ranked best match first.
    ///
    /// `owner_hint` is an optional pre-filter; backends may ignore it.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        owner_hint: Option<&str>,
    ) -> std::result::Result<Vec<IndexMatch>, IndexError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Index backend errors
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Index not found: {0}")]
    NotFound(String),
}

/// Connect to the backend selected by `config.provider`
pub async fn connect(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.to_lowercase().as_str() {
        "pinecone" => {
            let index = PineconeIndex::connect(config).await?;
            Ok(Arc::new(index))
        }
        "memory" => {
            tracing::warn!("Using in-memory vector index; memories will not survive a restart");
            Ok(Arc::new(InMemoryIndex::new()))
        }
        other => Err(NeuralicError::Config(format!(
            "Unknown index provider: {other}. Use pinecone or memory."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory_provider() {
        let config = IndexConfig {
            provider: "memory".to_string(),
            ..IndexConfig::default()
        };

        let index = connect(&config).await.unwrap();
        assert_eq!(index.name(), "memory");
    }

    #[tokio::test]
    async fn test_connect_unknown_provider() {
        let config = IndexConfig {
            provider: "faiss".to_string(),
            ..IndexConfig::default()
        };

        let err = connect(&config).await.err().unwrap();
        assert!(matches!(err, NeuralicError::Config(_)));
        assert!(err.to_string().contains("faiss"));
    }
}
