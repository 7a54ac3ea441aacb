//! Error types for Sage.
//!
//! One unified enum covers every failure category in the query pipeline.
//! Service failures (embedding, vector index, generative model) carry their
//! own variant so the orchestrator can degrade per service; a timeout is
//! reported through the variant of the service it bounded.

use thiserror::Error;

/// Unified error type for Sage.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generative model unreachable, failed or timed out
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding service unreachable, failed or timed out
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index unreachable, failed or timed out
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Invalid caller input (empty question, empty session id)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every answer path failed; no grounded answer can be produced
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error came from an external service (embedding, index, model).
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            AppError::Llm(_) | AppError::Embedding(_) | AppError::Retrieval(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
