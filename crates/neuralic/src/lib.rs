//! Neuralic - conversational memory and retrieval service
//!
//! Remembers what each user says to the chatbot as embedded records in a
//! vector index and recalls the most relevant ones on later turns, never
//! mixing memories between users.

pub mod autonomy;
pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod keys;
pub mod memory;
pub mod server;
pub mod storage;
pub mod testing;

pub use error::NeuralicError;
