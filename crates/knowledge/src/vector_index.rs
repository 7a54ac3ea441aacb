//! Vector index abstraction.
//!
//! The index is an external collaborator: passages are written by separate
//! ingestion tooling, and the query pipeline only reads.

use crate::types::Passage;
use sage_core::AppResult;

/// Statistics reported by an index backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub vector_count: u64,
}

/// Trait for vector index backends.
///
/// Failures are reported as `AppError::Retrieval`.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs and `sage stats`.
    fn backend_name(&self) -> &str;

    /// Return up to `top_k` passages nearest to `query_embedding`.
    ///
    /// Results are ordered by descending score. Fewer than `top_k` results is
    /// not an error.
    async fn query(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<Passage>>;

    /// Get statistics about the index.
    async fn stats(&self) -> AppResult<IndexStats>;
}
