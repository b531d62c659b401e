use std::fmt;

#[derive(Debug)]
pub struct CliError(pub String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CliError {}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        CliError(s)
    }
}

impl From<&str> for CliError {
    fn from(s: &str) -> Self {
        CliError(s.to_string())
    }
}

impl From<neuralic::NeuralicError> for CliError {
    fn from(e: neuralic::NeuralicError) -> Self {
        CliError(e.to_string())
    }
}

impl From<neuralic::memory::MemoryError> for CliError {
    fn from(e: neuralic::memory::MemoryError) -> Self {
        CliError(e.to_string())
    }
}

impl From<neuralic::keys::KeyError> for CliError {
    fn from(e: neuralic::keys::KeyError) -> Self {
        CliError(e.to_string())
    }
}

impl From<neuralic::storage::IndexError> for CliError {
    fn from(e: neuralic::storage::IndexError) -> Self {
        CliError(format!("Vector index error: {e}"))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError(format!("JSON error: {e}"))
    }
}

pub type CliResult<T> = Result<T, CliError>;
