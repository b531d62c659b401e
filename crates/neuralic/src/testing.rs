//! Test utilities for neuralic - deterministic providers and mocks
//!
//! Nothing here talks to the network:
//! - Hash and keyword embedding providers with predictable vectors
//! - Scripted, failing and slow index/embedding doubles
//! - A scripted chat model that records the prompts it receives

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::chat::{ChatError, ChatMessage, ChatModel};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::memory::types::{OWNER_KEY, TEXT_KEY};
use crate::storage::{InMemoryIndex, IndexEntry, IndexError, IndexMatch, Metadata, VectorIndex};

/// Dimension produced by [`MockEmbeddingProvider`] unless overridden
pub const MOCK_DIMENSIONS: usize = 384;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock embedding provider for fast tests that don't need real semantics.
/// Produces deterministic vectors based on an input text hash.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
    reported_dimensions: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dimensions(MOCK_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            reported_dimensions: dimensions,
        }
    }

    /// Report a different dimension than the vectors actually produced
    pub fn reporting(mut self, dimensions: usize) -> Self {
        self.reported_dimensions = dimensions;
        self
    }

    /// Generate a deterministic "embedding" from text using hashing.
    /// Values are in range [-1, 1].
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        (0..self.dimensions)
            .map(|i| {
                let x = seed
                    .wrapping_mul(i as u64 + 1)
                    .wrapping_add(0x9e3779b97f4a7c15);
                let normalized = (x as f32) / (u64::MAX as f32);
                (normalized * 2.0) - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.reported_dimensions
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Bag-of-words embedding over a fixed vocabulary.
///
/// Component `i` counts occurrences of `vocabulary[i]` (case-insensitive,
/// punctuation stripped), so texts sharing vocabulary words are similar and
/// texts sharing none are orthogonal.
#[derive(Debug, Clone)]
pub struct KeywordEmbeddingProvider {
    vocabulary: Vec<String>,
}

impl KeywordEmbeddingProvider {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        self.vocabulary
            .iter()
            .map(|term| words.iter().filter(|w| **w == term.as_str()).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

/// Embedding provider whose every call fails
#[derive(Debug, Clone, Default)]
pub struct FailingEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Api("API returned 401 Unauthorized".to_string()))
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Embedding provider that sleeps before answering
#[derive(Debug, Clone)]
pub struct SlowEmbeddingProvider {
    delay: Duration,
    inner: MockEmbeddingProvider,
}

impl SlowEmbeddingProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: MockEmbeddingProvider::new(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for SlowEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Build an index hit with optional owner/text metadata
pub fn scripted_match(id: &str, score: f32, owner: Option<&str>, text: Option<&str>) -> IndexMatch {
    let mut metadata = Metadata::new();
    if let Some(owner) = owner {
        metadata.insert(OWNER_KEY.to_string(), Value::String(owner.to_string()));
    }
    if let Some(text) = text {
        metadata.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }
    IndexMatch {
        id: id.to_string(),
        score,
        metadata,
    }
}

/// Index that answers every query with the same ranked list, ignoring the
/// query vector and the owner hint, and records the requested top_k.
#[derive(Debug, Default)]
pub struct ScriptedIndex {
    matches: Vec<IndexMatch>,
    requested_top_k: Mutex<Vec<usize>>,
    upserts: Mutex<Vec<IndexEntry>>,
}

impl ScriptedIndex {
    pub fn new(matches: Vec<IndexMatch>) -> Self {
        Self {
            matches,
            ..Self::default()
        }
    }

    pub fn requested_top_k(&self) -> Vec<usize> {
        lock(&self.requested_top_k).clone()
    }

    pub fn upserts(&self) -> Vec<IndexEntry> {
        lock(&self.upserts).clone()
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), IndexError> {
        lock(&self.upserts).push(entry);
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
        _owner_hint: Option<&str>,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        lock(&self.requested_top_k).push(top_k);
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Index whose every call fails
#[derive(Debug, Clone, Default)]
pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn upsert(&self, _entry: IndexEntry) -> Result<(), IndexError> {
        Err(IndexError::Api("API returned 503 Service Unavailable".to_string()))
    }

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _owner_hint: Option<&str>,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        Err(IndexError::Api("API returned 503 Service Unavailable".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// In-memory index that delays every call
#[derive(Debug)]
pub struct SlowIndex {
    delay: Duration,
    inner: InMemoryIndex,
}

impl SlowIndex {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: InMemoryIndex::new(),
        }
    }

    pub fn inner(&self) -> &InMemoryIndex {
        &self.inner
    }
}

#[async_trait]
impl VectorIndex for SlowIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), IndexError> {
        tokio::time::sleep(self.delay).await;
        self.inner.upsert(entry).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        owner_hint: Option<&str>,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        tokio::time::sleep(self.delay).await;
        self.inner.query(vector, top_k, owner_hint).await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Chat model returning queued replies and recording every prompt.
///
/// When the queue is empty it echoes the last user message.
#[derive(Debug, Default)]
pub struct ScriptedChatModel {
    replies: Mutex<VecDeque<Result<String, ChatError>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: &str) -> Self {
        lock(&self.replies).push_back(Ok(reply.to_string()));
        self
    }

    pub fn with_error(self, error: ChatError) -> Self {
        lock(&self.replies).push_back(Err(error));
        self
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        lock(&self.prompts).push(messages.to_vec());

        if let Some(next) = lock(&self.replies).pop_front() {
            return next;
        }

        Ok(messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| format!("echo: {}", m.content))
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
