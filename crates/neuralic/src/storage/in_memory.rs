//! Brute-force in-process vector index
//!
//! Scores every entry by cosine similarity. No durability; used for tests
//! and local runs with `index.provider = "memory"`.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IndexEntry, IndexError, IndexMatch, VectorIndex};
use crate::memory::types::OWNER_KEY;

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of every stored entry in insertion order
    pub async fn entries(&self) -> Vec<IndexEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), IndexError> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        owner_hint: Option<&str>,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        let entries = self.entries.read().await;

        let mut matches: Vec<IndexMatch> = entries
            .iter()
            .filter(|e| match owner_hint {
                Some(owner) => e.metadata.get(OWNER_KEY).and_then(|v| v.as_str()) == Some(owner),
                None => true,
            })
            .map(|e| IndexMatch {
                id: e.id.clone(),
                score: cosine_similarity(vector, &e.values),
                metadata: e.metadata.clone(),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);

        Ok(matches)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
