//! Context retrieval against the vector index.

use std::sync::Arc;

use sage_core::AppResult;

use crate::config::{RetrievalConfig, TimeoutConfig};
use crate::embeddings::EmbeddingProvider;
use crate::service::{bounded, Service};
use crate::types::Passage;
use crate::vector_index::VectorIndex;

/// Fetches the passages nearest to a normalized question.
pub struct ContextRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
    timeouts: TimeoutConfig,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
            timeouts,
        }
    }

    /// Configured number of passages per question.
    pub fn top_k(&self) -> usize {
        self.config.top_k
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed `text` and return up to `k` passages by descending score.
    ///
    /// Embedding failures are `AppError::Embedding`, index failures
    /// `AppError::Retrieval`.
    pub async fn retrieve(&self, text: &str, k: usize) -> AppResult<Vec<Passage>> {
        let embedding = bounded(
            Service::Embedding,
            self.timeouts.embedding(),
            self.embedder.embed(text),
        )
        .await?;

        self.retrieve_with_embedding(&embedding, k).await
    }

    /// Query the index with an embedding that was already computed.
    pub async fn retrieve_with_embedding(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> AppResult<Vec<Passage>> {
        let mut passages = bounded(
            Service::Index,
            self.timeouts.index(),
            self.index.query(embedding, k),
        )
        .await?;

        passages.retain(|p| p.score >= self.config.min_score);
        passages.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        passages.truncate(k);

        tracing::debug!(
            backend = self.index.backend_name(),
            count = passages.len(),
            top_score = passages.first().map(|p| p.score).unwrap_or(0.0),
            "Retrieved passages"
        );

        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::index::{InMemoryIndex, IndexedPassage};
    use crate::tests::{FailingEmbedder, FailingIndex};
    use sage_core::AppError;

    async fn corpus(embedder: &TrigramProvider) -> InMemoryIndex {
        let texts = [
            ("p1", "Black holes are regions where gravity traps light.", "Black Holes Explained"),
            ("p2", "The sun fuses hydrogen into helium in its core.", "How the Sun Works"),
            ("p3", "Vaccines train the immune system to recognise viruses.", "Vaccines 101"),
        ];
        let mut passages = Vec::new();
        for (id, text, source) in texts {
            passages.push(IndexedPassage {
                id: id.to_string(),
                text: text.to_string(),
                source: source.to_string(),
                embedding: embedder.embed(text).await.unwrap(),
            });
        }
        InMemoryIndex::new(passages)
    }

    async fn retriever(min_score: f32) -> ContextRetriever {
        let embedder = TrigramProvider::new(256);
        let index = corpus(&embedder).await;
        ContextRetriever::new(
            Arc::new(embedder),
            Arc::new(index),
            RetrievalConfig {
                top_k: 3,
                min_score,
            },
            TimeoutConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_most_relevant_passage_first() {
        let retriever = retriever(0.0).await;
        let passages = retriever.retrieve("What are black holes?", 2).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].source, "Black Holes Explained");
        assert!(passages[0].score >= passages[1].score);
    }

    #[tokio::test]
    async fn test_small_corpus_is_not_padded() {
        let retriever = retriever(0.0).await;
        let passages = retriever.retrieve("sun", 10).await.unwrap();
        assert_eq!(passages.len(), 3);
    }

    #[tokio::test]
    async fn test_min_score_filters() {
        let retriever = retriever(0.99).await;
        let passages = retriever.retrieve("quantum chromodynamics", 3).await.unwrap();
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure() {
        let retriever = ContextRetriever::new(
            Arc::new(FailingEmbedder),
            Arc::new(InMemoryIndex::default()),
            RetrievalConfig::default(),
            TimeoutConfig::default(),
        );
        let result = retriever.retrieve("anything", 3).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_index_failure() {
        let retriever = ContextRetriever::new(
            Arc::new(TrigramProvider::new(32)),
            Arc::new(FailingIndex),
            RetrievalConfig::default(),
            TimeoutConfig::default(),
        );
        let result = retriever.retrieve("anything", 3).await;
        assert!(matches!(result, Err(AppError::Retrieval(_))));
    }
}
