//! In-memory vector index over a JSONL corpus.
//!
//! Each line of the corpus file is one passage:
//! `{"id": "...", "text": "...", "source": "...", "embedding": [..]}`.
//! Queries are brute-force cosine similarity, which is fine for the few
//! thousand passages a transcript library produces.

use std::path::Path;

use crate::types::Passage;
use crate::vector_index::{IndexStats, VectorIndex};
use sage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A passage with its stored embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub id: String,
    pub text: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

/// Brute-force in-memory index.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    passages: Vec<IndexedPassage>,
}

impl InMemoryIndex {
    pub fn new(passages: Vec<IndexedPassage>) -> Self {
        Self { passages }
    }

    /// Load passages from a JSONL file. Blank lines are skipped.
    pub fn load_jsonl(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Retrieval(format!("Failed to read corpus at {:?}: {}", path, e))
        })?;

        let mut passages = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let passage: IndexedPassage = serde_json::from_str(line).map_err(|e| {
                AppError::Retrieval(format!(
                    "Invalid passage at {:?} line {}: {}",
                    path,
                    line_no + 1,
                    e
                ))
            })?;
            passages.push(passage);
        }

        tracing::info!("Loaded {} passages from {:?}", passages.len(), path);
        Ok(Self::new(passages))
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

#[async_trait::async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend_name(&self) -> &str {
        "local"
    }

    async fn query(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<Passage>> {
        let mut results: Vec<Passage> = self
            .passages
            .iter()
            .map(|p| Passage {
                id: p.id.clone(),
                text: p.text.clone(),
                source: p.source.clone(),
                score: cosine_similarity(query_embedding, &p.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        tracing::debug!(
            "Retrieved {} passages (requested top-{})",
            results.len(),
            top_k
        );

        Ok(results)
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        Ok(IndexStats {
            vector_count: self.passages.len() as u64,
        })
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn passage(id: &str, source: &str, embedding: Vec<f32>) -> IndexedPassage {
        IndexedPassage {
            id: id.to_string(),
            text: format!("text of {}", id),
            source: source.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_orders_by_descending_score() {
        let index = InMemoryIndex::new(vec![
            passage("far", "Video C", vec![0.0, 1.0]),
            passage("near", "Video A", vec![1.0, 0.0]),
            passage("mid", "Video B", vec![1.0, 1.0]),
        ]);

        let results = index.query(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert_eq!(results[0].source, "Video A");
    }

    #[tokio::test]
    async fn test_fewer_than_k_is_not_padded() {
        let index = InMemoryIndex::new(vec![passage("only", "Video", vec![1.0, 0.0])]);
        let results = index.query(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_load_jsonl_and_stats() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corpus.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"id":"p1","text":"Black holes","source":"Black Holes Explained","embedding":[1.0,0.0]}"#,
                "\n\n",
                r#"{"id":"p2","text":"Stars","source":"The Sun","embedding":[0.0,1.0]}"#,
                "\n"
            ),
        )
        .unwrap();

        let index = InMemoryIndex::load_jsonl(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.stats().await.unwrap().vector_count, 2);
    }

    #[test]
    fn test_load_jsonl_reports_bad_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corpus.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let err = InMemoryIndex::load_jsonl(&path).unwrap_err();
        assert!(matches!(err, AppError::Retrieval(msg) if msg.contains("line 1")));
    }

    #[test]
    fn test_missing_corpus_is_retrieval_error() {
        let temp = TempDir::new().unwrap();
        let result = InMemoryIndex::load_jsonl(&temp.path().join("missing.jsonl"));
        assert!(matches!(result, Err(AppError::Retrieval(_))));
    }
}
