//! Semantic answer cache.
//!
//! Maps a question embedding to a previously generated answer when a past
//! question in the same mode was at least `similarity_threshold` similar.
//! Bounded by `capacity` (oldest entry evicted first) with lazy TTL expiry.
//! No two live entries in one mode are above the threshold from each other:
//! storing a near-duplicate replaces it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::CacheConfig;
use crate::embeddings::EmbeddingProvider;
use crate::index::cosine_similarity;
use crate::service::{bounded, Service};
use crate::types::{Confidence, Mode};

/// A cached answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub embedding: Vec<f32>,
    /// Normalized question text
    pub question: String,
    /// Answer in the corpus language
    pub answer: String,
    pub sources: Vec<String>,
    pub confidence: Confidence,
    pub mode: Mode,
    pub created_at: DateTime<Utc>,
}

/// Outcome of checking the cache for a question.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    Hit { entry: CacheEntry, similarity: f32 },
    /// No match; the embedding is kept so the caller can store and retrieve with it.
    Miss { embedding: Vec<f32> },
    /// The embedding service failed; treat as a miss without an embedding.
    Degraded { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub similarity_threshold: f32,
    pub ttl_secs: u64,
}

pub struct SemanticCache {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<VecDeque<CacheEntry>>,
    config: CacheConfig,
    embed_timeout: Duration,
}

impl SemanticCache {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        config: CacheConfig,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            entries: RwLock::new(VecDeque::new()),
            config,
            embed_timeout,
        }
    }

    /// Embed `question` and look it up.
    pub async fn check(&self, question: &str, mode: Mode) -> CacheLookup {
        let embedding = match bounded(
            Service::Embedding,
            self.embed_timeout,
            self.embedder.embed(question),
        )
        .await
        {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("Cache degraded, embedding failed: {}", e);
                return CacheLookup::Degraded {
                    reason: e.to_string(),
                };
            }
        };

        match self.lookup(&embedding, mode).await {
            Some((entry, similarity)) => CacheLookup::Hit { entry, similarity },
            None => CacheLookup::Miss { embedding },
        }
    }

    /// Best live entry in `mode` at or above the threshold.
    ///
    /// Exact ties go to the most recently inserted entry. Does not mutate.
    pub async fn lookup(&self, embedding: &[f32], mode: Mode) -> Option<(CacheEntry, f32)> {
        self.lookup_at(embedding, mode, Utc::now()).await
    }

    pub(crate) async fn lookup_at(
        &self,
        embedding: &[f32],
        mode: Mode,
        now: DateTime<Utc>,
    ) -> Option<(CacheEntry, f32)> {
        let entries = self.entries.read().await;
        let mut best: Option<(&CacheEntry, f32)> = None;

        for entry in entries.iter() {
            if entry.mode != mode || self.is_expired(entry, now) {
                continue;
            }
            let similarity = cosine_similarity(embedding, &entry.embedding);
            if similarity < self.config.similarity_threshold {
                continue;
            }
            if best.map_or(true, |(_, s)| similarity >= s) {
                best = Some((entry, similarity));
            }
        }

        best.map(|(entry, similarity)| {
            tracing::debug!(
                similarity,
                cached_question = %entry.question,
                "Cache hit"
            );
            (entry.clone(), similarity)
        })
    }

    /// Insert an entry, replacing near-duplicates and evicting the oldest when full.
    pub async fn store(&self, entry: CacheEntry) {
        let now = entry.created_at;
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|e| {
            !self.is_expired(e, now)
                && !(e.mode == entry.mode
                    && cosine_similarity(&e.embedding, &entry.embedding)
                        >= self.config.similarity_threshold)
        });
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Removed {} expired or near-duplicate cache entries", removed);
        }

        while entries.len() >= self.config.capacity {
            let oldest = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(i, _)| i);
            match oldest {
                Some(i) => {
                    entries.remove(i);
                }
                None => break,
            }
        }

        entries.push_back(entry);
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(entry.created_at);
        let ttl = i64::try_from(self.config.ttl_secs).unwrap_or(i64::MAX);
        age.num_seconds() >= ttl
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            capacity: self.config.capacity,
            similarity_threshold: self.config.similarity_threshold,
            ttl_secs: self.config.ttl_secs,
        }
    }
}
