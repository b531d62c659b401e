//! Error types for Neuralic

use thiserror::Error;

use crate::chat::ChatError;
use crate::keys::KeyError;
use crate::memory::MemoryError;
use crate::storage::IndexError;

/// Main error type for Neuralic operations
#[derive(Error, Debug)]
pub enum NeuralicError {
    /// Configuration errors (missing credentials, unreadable config file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Memory store errors (embedding, persistence, invalid arguments)
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Vector index errors outside the memory store (connect, provisioning)
    #[error("Vector index error: {0}")]
    Index(#[from] IndexError),

    /// Chat completion errors
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// API key registry errors
    #[error(transparent)]
    Keys(#[from] KeyError),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Neuralic operations
pub type Result<T> = std::result::Result<T, NeuralicError>;
