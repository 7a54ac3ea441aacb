//! Query pipeline orchestration.
//!
//! One question moves through normalize, cache check, retrieve, synthesize,
//! cache store and memory update. Every service failure resolves to a
//! lower-confidence answer; only when retrieval and synthesis both fail is
//! an `AppError::Unavailable` returned.

use std::sync::Arc;

use chrono::Utc;
use sage_core::{AppError, AppResult};
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::{CacheEntry, CacheLookup, SemanticCache};
use crate::language::LanguageNormalizer;
use crate::memory::ConversationMemory;
use crate::rag::synthesis::{AnswerSynthesizer, Synthesis, SynthesisRequest};
use crate::rag::types::{StructuredAnswer, NO_INFORMATION_ANSWER};
use crate::retriever::ContextRetriever;
use crate::types::{Confidence, Mode, Passage, QaPair, Question};
use crate::vector_index::IndexStats;

const EXTRACTIVE_PREFIX: &str =
    "The answer service is unavailable right now. Here is what the videos say:";

/// Passages quoted in an extractive answer.
const EXTRACTIVE_PASSAGES: usize = 3;

/// Sequences the pipeline stages for each question.
///
/// The cache and memory are shared handles so several pipelines (or a
/// pipeline and a caller inspecting state) can use the same instances.
pub struct QueryPipeline {
    normalizer: LanguageNormalizer,
    cache: Arc<SemanticCache>,
    memory: Arc<ConversationMemory>,
    retriever: ContextRetriever,
    synthesizer: AnswerSynthesizer,
}

impl QueryPipeline {
    pub fn new(
        normalizer: LanguageNormalizer,
        cache: Arc<SemanticCache>,
        memory: Arc<ConversationMemory>,
        retriever: ContextRetriever,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            normalizer,
            cache,
            memory,
            retriever,
            synthesizer,
        }
    }

    pub fn cache(&self) -> &Arc<SemanticCache> {
        &self.cache
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub fn index_backend(&self) -> &str {
        self.retriever.index().backend_name()
    }

    pub async fn index_stats(&self) -> AppResult<IndexStats> {
        self.retriever.index().stats().await
    }

    /// Answer one question for a session.
    ///
    /// Rejects an empty question or session id before any service call.
    pub async fn ask(
        &self,
        question: &str,
        session_id: &str,
        mode: Mode,
    ) -> AppResult<StructuredAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }
        if session_id.trim().is_empty() {
            return Err(AppError::Validation("Session id cannot be empty".to_string()));
        }

        let span = tracing::info_span!(
            "query",
            request_id = %Uuid::new_v4(),
            session = session_id,
            mode = %mode
        );
        self.run(question, session_id, mode).instrument(span).await
    }

    async fn run(&self, raw: &str, session_id: &str, mode: Mode) -> AppResult<StructuredAnswer> {
        tracing::debug!("normalize");
        let question = match self.normalizer.normalize(raw).await {
            Ok(question) => question,
            Err(e) => {
                tracing::warn!(
                    "Language detection failed, treating question as {}: {}",
                    self.normalizer.corpus_language(),
                    e
                );
                self.normalizer.passthrough(raw)
            }
        };

        let rule = self.memory.classify(&question.normalized);
        let is_follow_up = rule.is_some();
        if let Some(rule) = rule {
            tracing::debug!(rule = rule.name(), "Classified as follow-up");
        }

        // A follow-up depends on this session's history, so a cached answer
        // from another conversation cannot be reused for it.
        let conversation = if is_follow_up {
            self.memory
                .get_recent_context(session_id, self.memory.config().context_pairs)
                .await
        } else {
            Vec::new()
        };
        let use_cache = conversation.is_empty();

        tracing::debug!(use_cache, "cache_check");
        let embedding = if use_cache {
            match self.cache.check(&question.normalized, mode).await {
                CacheLookup::Hit { entry, similarity } => {
                    tracing::info!(similarity, "Answered from cache");
                    return Ok(self
                        .answer_from_cache(&question, entry, session_id, is_follow_up)
                        .await);
                }
                CacheLookup::Miss { embedding } => Some(embedding),
                CacheLookup::Degraded { reason } => {
                    tracing::warn!("Cache unavailable, forcing miss: {}", reason);
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!("retrieve");
        let k = self.retriever.top_k();
        let retrieved = match &embedding {
            Some(embedding) => self.retriever.retrieve_with_embedding(embedding, k).await,
            None => self.retriever.retrieve(&question.normalized, k).await,
        };

        let answer = match retrieved {
            Ok(passages) if passages.is_empty() => {
                tracing::info!("No passages found");
                let text = self
                    .normalizer
                    .translate(NO_INFORMATION_ANSWER, &question.language)
                    .await;
                self.remember(session_id, &question, NO_INFORMATION_ANSWER).await;
                return Ok(
                    StructuredAnswer::new(text, Confidence::Low, Vec::new(), &question.language, mode)
                        .with_follow_up(is_follow_up),
                );
            }
            Ok(passages) => {
                self.answer_from_passages(&question, &passages, &conversation, mode, embedding, use_cache)
                    .await
            }
            Err(e) => {
                tracing::warn!("Retrieval failed, answering without passages: {}", e);
                self.answer_without_passages(&question, &conversation, mode, e)
                    .await?
            }
        };

        tracing::debug!("memory_update");
        self.remember(session_id, &question, &answer.text).await;

        let text = self
            .normalizer
            .translate(&answer.text, &question.language)
            .await;

        Ok(StructuredAnswer::new(
            text,
            answer.confidence,
            answer.sources,
            &question.language,
            mode,
        )
        .with_follow_up(is_follow_up))
    }

    async fn answer_from_cache(
        &self,
        question: &Question,
        entry: CacheEntry,
        session_id: &str,
        is_follow_up: bool,
    ) -> StructuredAnswer {
        self.remember(session_id, question, &entry.answer).await;
        let text = self.normalizer.translate(&entry.answer, &question.language).await;

        StructuredAnswer::new(text, entry.confidence, entry.sources, &question.language, entry.mode)
            .with_follow_up(is_follow_up)
            .from_cache()
    }

    async fn answer_from_passages(
        &self,
        question: &Question,
        passages: &[Passage],
        conversation: &[QaPair],
        mode: Mode,
        embedding: Option<Vec<f32>>,
        use_cache: bool,
    ) -> Draft {
        tracing::debug!(passages = passages.len(), "synthesize");
        let request = SynthesisRequest {
            question: &question.normalized,
            target_language: self.normalizer.corpus_language(),
            passages,
            conversation,
            mode,
        };

        let synthesis = match self.synthesizer.synthesize(request).await {
            Ok(synthesis) => synthesis,
            Err(e) => {
                tracing::warn!("Answer synthesis failed, using extractive answer: {}", e);
                return extractive_answer(passages);
            }
        };

        if use_cache && !synthesis.degraded {
            if let Some(embedding) = embedding {
                tracing::debug!("cache_store");
                self.cache
                    .store(CacheEntry {
                        embedding,
                        question: question.normalized.clone(),
                        answer: synthesis.answer.clone(),
                        sources: synthesis.sources.clone(),
                        confidence: synthesis.confidence,
                        mode,
                        created_at: Utc::now(),
                    })
                    .await;
            }
        }

        Draft::from(synthesis)
    }

    async fn answer_without_passages(
        &self,
        question: &Question,
        conversation: &[QaPair],
        mode: Mode,
        retrieval_error: AppError,
    ) -> AppResult<Draft> {
        let request = SynthesisRequest {
            question: &question.normalized,
            target_language: self.normalizer.corpus_language(),
            passages: &[],
            conversation,
            mode,
        };

        match self.synthesizer.synthesize(request).await {
            Ok(synthesis) => Ok(Draft {
                text: synthesis.answer,
                confidence: Confidence::Low,
                sources: Vec::new(),
            }),
            Err(e) => {
                tracing::error!("Retrieval and synthesis both failed");
                Err(AppError::Unavailable(format!(
                    "no answer path available (retrieval: {}; synthesis: {})",
                    retrieval_error, e
                )))
            }
        }
    }

    async fn remember(&self, session_id: &str, question: &Question, answer: &str) {
        self.memory
            .add_pair(session_id, &question.normalized, answer)
            .await;
    }
}

/// An answer in the corpus language, before translation.
struct Draft {
    text: String,
    confidence: Confidence,
    sources: Vec<String>,
}

impl From<Synthesis> for Draft {
    fn from(synthesis: Synthesis) -> Self {
        Self {
            text: synthesis.answer,
            confidence: synthesis.confidence,
            sources: synthesis.sources,
        }
    }
}

/// Quote the top passages verbatim when the model is unavailable.
fn extractive_answer(passages: &[Passage]) -> Draft {
    let mut text = EXTRACTIVE_PREFIX.to_string();
    let mut sources: Vec<String> = Vec::new();

    for passage in passages.iter().take(EXTRACTIVE_PASSAGES) {
        text.push_str(&format!("\n\n- {} ({})", passage.text.trim(), passage.source));
        if !sources.contains(&passage.source) {
            sources.push(passage.source.clone());
        }
    }

    Draft {
        text,
        confidence: Confidence::Low,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str, source: &str) -> Passage {
        Passage {
            id: text.to_string(),
            text: text.to_string(),
            source: source.to_string(),
            score: 0.5,
        }
    }

    #[test]
    fn test_extractive_answer_quotes_top_passages() {
        let passages = vec![
            passage("Black holes trap light.", "Black Holes Explained"),
            passage("They can be tiny or huge.", "How Big Are Black Holes"),
            passage("Event horizons mark the edge.", "Black Holes Explained"),
            passage("Unrelated fourth passage.", "Other"),
        ];

        let draft = extractive_answer(&passages);
        assert!(draft.text.starts_with(EXTRACTIVE_PREFIX));
        assert!(draft.text.contains("- Black holes trap light. (Black Holes Explained)"));
        assert!(!draft.text.contains("Unrelated fourth passage."));
        assert_eq!(draft.confidence, Confidence::Low);
        assert_eq!(
            draft.sources,
            vec!["Black Holes Explained", "How Big Are Black Holes"]
        );
    }
}
