//! Timeout bounds for external service calls.

use std::future::Future;
use std::time::Duration;

use sage_core::{AppError, AppResult};

/// External collaborators whose calls are bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    Index,
    Llm,
}

impl Service {
    /// Error for this service; a timeout is reported the same way as any other failure.
    pub fn error(&self, message: impl Into<String>) -> AppError {
        let message = message.into();
        match self {
            Service::Embedding => AppError::Embedding(message),
            Service::Index => AppError::Retrieval(message),
            Service::Llm => AppError::Llm(message),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Service::Embedding => "embedding service",
            Service::Index => "vector index",
            Service::Llm => "generative model",
        }
    }
}

/// Run `fut`, failing with the service's error variant if it exceeds `limit`.
pub async fn bounded<T, F>(service: Service, limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(service.error(format!(
            "{} timed out after {}ms",
            service.name(),
            limit.as_millis()
        ))),
    }
}
