//! Memory store: embed, persist and retrieve utterances scoped by owner
//!
//! Every call is two sequential round trips (embedding, then index) with no
//! cache and no shared mutable state, so a single `MemoryStore` can be
//! cloned into as many concurrent conversations as needed.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, OpenAiEmbeddings};
use crate::memory::types::{
    MemoryError, MemoryMatch, MemoryRecord, OWNER_KEY, Owner, RecordId, Result, TEXT_KEY,
};
use crate::storage::{self, IndexEntry, IndexMatch, VectorIndex};

/// Upper bound on candidates requested from the index in one query.
/// Pinecone rejects `topK` above 1 000 when metadata is included.
pub const MAX_CANDIDATES: usize = 1_000;

/// Tunables for a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Bound on a single embedding call
    pub embed_timeout: Duration,
    /// Bound on a single index read or write
    pub index_timeout: Duration,
    /// Candidates requested per result so post-filtering can still fill top_k
    pub candidate_multiplier: usize,
    /// top_k used by callers that do not choose one
    pub default_top_k: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            embed_timeout: Duration::from_secs(5),
            index_timeout: Duration::from_secs(5),
            candidate_multiplier: 3,
            default_top_k: 5,
        }
    }
}

impl StoreOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
            index_timeout: Duration::from_secs(config.index.timeout_secs),
            candidate_multiplier: config.memory.candidate_multiplier.max(1),
            default_top_k: config.memory.default_top_k.max(1),
        }
    }
}

/// Per-owner semantic memory over an embedding provider and a vector index
#[derive(Clone)]
pub struct MemoryStore {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    options: StoreOptions,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("embedder", &self.embedder.name())
            .field("index", &self.index.name())
            .field("options", &self.options)
            .finish()
    }
}

impl MemoryStore {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        options: StoreOptions,
    ) -> Self {
        Self {
            embedder,
            index,
            options,
        }
    }

    /// Build the configured providers and wrap them in a store
    pub async fn from_config(config: &Config) -> crate::error::Result<Self> {
        let embedder = Arc::new(OpenAiEmbeddings::from_env(&config.embedding)?);
        let index = storage::connect(&config.index).await?;
        Ok(Self::new(embedder, index, StoreOptions::from_config(config)))
    }

    pub fn default_top_k(&self) -> usize {
        self.options.default_top_k
    }

    /// Remember `text` for `owner`, returning the new record's id.
    ///
    /// Identical `(owner, text)` pairs produce distinct records. The index
    /// write runs as its own task: once dispatched it completes even if the
    /// caller stops waiting.
    pub async fn store(&self, owner: &str, text: &str) -> Result<RecordId> {
        let owner = Owner::try_from(owner)?;
        validate_text(text)?;

        let vector = self.embed(text).await?;
        let record = MemoryRecord::new(owner, text.to_string(), vector);
        let id = record.id;
        let metadata = record.metadata();
        let entry = IndexEntry {
            id: id.to_string(),
            values: record.vector,
            metadata,
        };

        let index = Arc::clone(&self.index);
        let timeout = self.options.index_timeout;
        let write =
            tokio::spawn(async move { tokio::time::timeout(timeout, index.upsert(entry)).await });

        match write.await {
            Ok(Ok(Ok(()))) => {
                debug!("Stored memory {} for owner {}", id, record.owner);
                Ok(id)
            }
            Ok(Ok(Err(e))) => Err(MemoryError::PersistenceUnavailable(e.to_string())),
            Ok(Err(_)) => Err(MemoryError::PersistenceUnavailable(format!(
                "index write timed out after {timeout:?}"
            ))),
            Err(e) => Err(MemoryError::PersistenceUnavailable(format!(
                "index write task failed: {e}"
            ))),
        }
    }

    /// Texts of the `top_k` memories of `owner` most similar to `text`,
    /// best match first.
    pub async fn query(&self, owner: &str, text: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .query_matches(owner, text, top_k)
            .await?
            .into_iter()
            .map(|m| m.text)
            .collect())
    }

    /// Like [`MemoryStore::query`] but keeps ids and scores
    pub async fn query_matches(
        &self,
        owner: &str,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryMatch>> {
        let owner = Owner::try_from(owner)?;
        validate_text(text)?;
        if top_k == 0 {
            return Err(MemoryError::InvalidArgument(
                "top_k must be positive".to_string(),
            ));
        }

        let vector = self.embed(text).await?;

        let candidates = top_k
            .saturating_mul(self.options.candidate_multiplier.max(1))
            .min(MAX_CANDIDATES);

        let hits = tokio::time::timeout(
            self.options.index_timeout,
            self.index.query(&vector, candidates, Some(owner.as_str())),
        )
        .await
        .map_err(|_| {
            MemoryError::PersistenceUnavailable(format!(
                "index query timed out after {:?}",
                self.options.index_timeout
            ))
        })?
        .map_err(|e| MemoryError::PersistenceUnavailable(e.to_string()))?;

        let total = hits.len();
        let matches: Vec<MemoryMatch> = hits
            .into_iter()
            .filter_map(|hit| owned_match(hit, &owner))
            .take(top_k)
            .collect();

        debug!(
            "Query for owner {} kept {} of {} candidates",
            owner,
            matches.len(),
            total
        );

        Ok(matches)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = tokio::time::timeout(self.options.embed_timeout, self.embedder.embed(text))
            .await
            .map_err(|_| {
                MemoryError::EmbeddingUnavailable(format!(
                    "embedding timed out after {:?}",
                    self.options.embed_timeout
                ))
            })?
            .map_err(|e| MemoryError::EmbeddingUnavailable(e.to_string()))?;

        let expected = self.embedder.dimensions();
        if vector.len() != expected {
            return Err(MemoryError::EmbeddingUnavailable(format!(
                "expected {expected}-dimensional embedding, got {}",
                vector.len()
            )));
        }

        Ok(vector)
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(MemoryError::InvalidArgument(
            "text cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Keep a hit only if its metadata names `owner` and carries text
fn owned_match(hit: IndexMatch, owner: &Owner) -> Option<MemoryMatch> {
    let hit_owner = hit.metadata.get(OWNER_KEY)?.as_str()?;
    if hit_owner != owner.as_str() {
        return None;
    }
    let text = hit.metadata.get(TEXT_KEY)?.as_str()?.to_string();
    Some(MemoryMatch {
        id: hit.id,
        text,
        score: hit.score,
    })
}
