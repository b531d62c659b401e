//! Conversational memory
//!
//! Stores every remembered utterance as an embedded record and retrieves
//! the ones most relevant to a new message, never crossing owners.

pub mod store;
pub mod types;

pub use store::{MAX_CANDIDATES, MemoryStore, StoreOptions};
pub use types::{MemoryError, MemoryMatch, MemoryRecord, Owner, RecordId};
