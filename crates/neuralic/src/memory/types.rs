//! Memory types for the Neuralic system
//!
//! Defines the record persisted for every remembered utterance, the
//! validated owner identifier that scopes retrieval, and the error
//! taxonomy surfaced by the memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::Metadata;

/// Metadata key holding the record owner
pub const OWNER_KEY: &str = "owner";
/// Metadata key holding the remembered text
pub const TEXT_KEY: &str = "text";
/// Metadata key holding the creation timestamp (RFC 3339)
pub const CREATED_AT_KEY: &str = "created_at";

/// Errors surfaced by the memory store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MemoryError {
    /// The embedding provider failed (auth, network, quota, timeout, bad response)
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    /// The vector index read or write failed
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),
    /// Empty owner, empty text or non-positive top_k
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Identifier of the user or conversation a record belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Owner(String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Owner {
    type Error = MemoryError;

    fn try_from(value: &str) -> Result<Self> {
        Self::try_from(value.to_string())
    }
}

impl TryFrom<String> for Owner {
    type Error = MemoryError;

    fn try_from(value: String) -> Result<Self> {
        if value.trim().is_empty() {
            return Err(MemoryError::InvalidArgument(
                "owner cannot be empty".to_string(),
            ));
        }
        Ok(Owner(value))
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.0
    }
}

impl AsRef<str> for Owner {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique, immutable identifier assigned to a record at write time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single remembered utterance.
///
/// Records are never updated in place; a correction is a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier for this record
    pub id: RecordId,
    /// Who this record belongs to
    pub owner: Owner,
    /// The literal message content
    pub text: String,
    /// Embedding of `text`; length fixed by the configured model
    pub vector: Vec<f32>,
    /// When this record was created
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a new record with a fresh id
    pub fn new(owner: Owner, text: String, vector: Vec<f32>) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            text,
            vector,
            created_at: Utc::now(),
        }
    }

    /// Metadata stored alongside the vector in the index
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(OWNER_KEY.to_string(), Value::String(self.owner.to_string()));
        metadata.insert(TEXT_KEY.to_string(), Value::String(self.text.clone()));
        metadata.insert(
            CREATED_AT_KEY.to_string(),
            Value::String(self.created_at.to_rfc3339()),
        );
        metadata
    }
}

/// A retrieved memory with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryMatch {
    /// Index identifier of the matched record
    pub id: String,
    /// The remembered text
    pub text: String,
    /// Similarity reported by the index (higher is closer)
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_rejects_empty() {
        assert!(matches!(
            Owner::try_from(""),
            Err(MemoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            Owner::try_from("   "),
            Err(MemoryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_owner_accepts_any_non_empty_identifier() {
        assert_eq!(Owner::try_from("alice").unwrap().as_str(), "alice");
        assert_eq!(
            Owner::try_from("user@example.com").unwrap().as_str(),
            "user@example.com"
        );
    }

    #[test]
    fn test_owner_deserialization_validates() {
        let ok: Owner = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(ok.as_str(), "bob");

        let err = serde_json::from_str::<Owner>("\"\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_record_ids_are_unique() {
        let a = RecordId::new();
        let b = RecordId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_metadata_carries_owner_and_text() {
        let record = MemoryRecord::new(
            Owner::try_from("alice").unwrap(),
            "I live in Lisbon".to_string(),
            vec![0.1; 8],
        );

        let metadata = record.metadata();
        assert_eq!(metadata[OWNER_KEY], "alice");
        assert_eq!(metadata[TEXT_KEY], "I live in Lisbon");
        assert!(metadata[CREATED_AT_KEY].as_str().is_some());
    }

    #[test]
    fn test_memory_error_display() {
        let err = MemoryError::EmbeddingUnavailable("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Embedding unavailable: quota exceeded");

        let err = MemoryError::PersistenceUnavailable("503".to_string());
        assert_eq!(err.to_string(), "Persistence unavailable: 503");
    }
}
