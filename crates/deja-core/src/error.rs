//! Error types for deja

use thiserror::Error;

/// Result type alias for deja operations
pub type DejaResult<T> = Result<T, DejaError>;

/// Main error type for deja
#[derive(Error, Debug, Clone)]
pub enum DejaError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache backend errors
    #[error("Backend error: {0}")]
    Backend(String),

    /// Vectorizer errors
    #[error("Vectorizer error: {0}")]
    Vectorizer(String),

    /// Completion client errors
    #[error("Completion error: {0}")]
    Completion(String),

    /// History index out of range
    #[error("Index {index} out of range for history of length {len}")]
    OutOfBounds { index: usize, len: usize },

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl DejaError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Create a new vectorizer error
    pub fn vectorizer(message: impl Into<String>) -> Self {
        Self::Vectorizer(message.into())
    }

    /// Create a new completion client error
    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion(message.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new out-of-bounds error
    pub const fn out_of_bounds(index: usize, len: usize) -> Self {
        Self::OutOfBounds { index, len }
    }
}

impl From<std::io::Error> for DejaError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for DejaError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}
