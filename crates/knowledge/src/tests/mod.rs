//! Scripted service fakes shared by the unit tests, and pipeline scenarios.


use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sage_core::{AppError, AppResult};
use sage_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

use crate::cache::SemanticCache;
use crate::config::PipelineConfig;
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::index::{InMemoryIndex, IndexedPassage};
use crate::language::LanguageNormalizer;
use crate::memory::ConversationMemory;
use crate::rag::{AnswerSynthesizer, QueryPipeline};
use crate::retriever::ContextRetriever;
use crate::types::Passage;
use crate::vector_index::{IndexStats, VectorIndex};

const DEFAULT_ANSWER: &str =
    r#"{"answer": "Here is what the videos explain.", "confidence": "high"}"#;

/// A generative model that replies from a script.
///
/// JSON requests are answer calls and pop the scripted replies or failures
/// (falling back to a well-formed default). Other requests are language
/// calls: detection prompts get a `Language:`/`Translation:` reply, anything
/// else is treated as a translation and echoed back tagged with the target
/// language.
pub(crate) struct ScriptedLlm {
    answers: Mutex<VecDeque<AppResult<String>>>,
    detection: Option<(String, String)>,
    fail_language: bool,
    fail_answers: bool,
    answer_calls: AtomicUsize,
    language_calls: AtomicUsize,
    answer_requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            detection: None,
            fail_language: false,
            fail_answers: false,
            answer_calls: AtomicUsize::new(0),
            language_calls: AtomicUsize::new(0),
            answer_requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a raw answer reply.
    pub fn with_answer(self, raw: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Ok(raw.to_string()));
        self
    }

    /// Queue an answer call that fails with `message`.
    pub fn with_failed_answer(self, message: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Err(AppError::Llm(message.to_string())));
        self
    }

    /// Report every question as `language` with the given translation.
    pub fn with_language(mut self, language: &str, translation: &str) -> Self {
        self.detection = Some((language.to_string(), translation.to_string()));
        self
    }

    pub fn failing_language(mut self) -> Self {
        self.fail_language = true;
        self
    }

    pub fn failing_answers(mut self) -> Self {
        self.fail_answers = true;
        self
    }

    pub fn answer_calls(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }

    pub fn language_calls(&self) -> usize {
        self.language_calls.load(Ordering::SeqCst)
    }

    pub fn answer_prompts(&self) -> Vec<String> {
        self.answer_requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    pub fn answer_systems(&self) -> Vec<String> {
        self.answer_requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.system.clone().unwrap_or_default())
            .collect()
    }

    fn answer(&self, request: &LlmRequest) -> AppResult<String> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        self.answer_requests.lock().unwrap().push(request.clone());
        if self.fail_answers {
            return Err(AppError::Llm("model unreachable".to_string()));
        }
        let scripted = self.answers.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(DEFAULT_ANSWER.to_string()))
    }

    fn language(&self, request: &LlmRequest) -> AppResult<String> {
        self.language_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_language {
            return Err(AppError::Llm("model unreachable".to_string()));
        }

        let text = request
            .prompt
            .rsplit_once("\n\nText: ")
            .map(|(_, text)| text.to_string())
            .unwrap_or_default();

        if request.prompt.contains("Language:") {
            return Ok(match &self.detection {
                Some((language, translation)) => {
                    format!("Language: {}\nTranslation: {}", language, translation)
                }
                None => format!("Language: English\nTranslation: {}", text),
            });
        }

        let target = request
            .prompt
            .split_once("into ")
            .and_then(|(_, rest)| rest.split_once('.'))
            .map(|(target, _)| target.to_string())
            .unwrap_or_default();
        Ok(format!("[{}] {}", target, text))
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let content = if request.json_output {
            self.answer(request)?
        } else {
            self.language(request)?
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(0, 0),
        })
    }
}

/// An embedding service that is always down.
#[derive(Debug)]
pub(crate) struct FailingEmbedder;

#[async_trait::async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimensions(&self) -> usize {
        8
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::Embedding("embedding service unreachable".to_string()))
    }
}

/// A vector index that is always down.
pub(crate) struct FailingIndex;

#[async_trait::async_trait]
impl VectorIndex for FailingIndex {
    fn backend_name(&self) -> &str {
        "failing"
    }

    async fn query(&self, _query_embedding: &[f32], _top_k: usize) -> AppResult<Vec<Passage>> {
        Err(AppError::Retrieval("index returned 503".to_string()))
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        Err(AppError::Retrieval("index returned 503".to_string()))
    }
}

pub(crate) const EMBEDDING_DIMS: usize = 256;

/// A small transcript corpus embedded with the trigram provider.
pub(crate) async fn transcript_index() -> InMemoryIndex {
    let embedder = TrigramProvider::new(EMBEDDING_DIMS);
    let transcripts = [
        (
            "bh-1",
            "Black holes are regions of space where gravity is so strong that not even light escapes.",
            "Black Holes Explained",
        ),
        (
            "bh-2",
            "Black holes range in size from a few kilometres to billions of kilometres across.",
            "How Big Are Black Holes",
        ),
        (
            "sun-1",
            "The sun fuses hydrogen into helium in its core and releases enormous energy.",
            "How the Sun Works",
        ),
        (
            "vac-1",
            "Vaccines train the immune system to recognise viruses before an infection.",
            "Vaccines 101",
        ),
    ];

    let mut passages = Vec::new();
    for (id, text, source) in transcripts {
        let embedding = embedder.embed(text).await.unwrap();
        passages.push(IndexedPassage {
            id: id.to_string(),
            text: text.to_string(),
            source: source.to_string(),
            embedding,
        });
    }
    InMemoryIndex::new(passages)
}

/// A pipeline over fresh cache and memory, with the given services.
pub(crate) fn pipeline_with(
    llm: Arc<ScriptedLlm>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    workspace: &Path,
) -> QueryPipeline {
    let config = PipelineConfig::default();
    let timeout = Duration::from_secs(5);

    let normalizer = LanguageNormalizer::new(
        llm.clone(),
        "test-model",
        workspace,
        config.language.corpus_language.clone(),
        timeout,
    )
    .unwrap();
    let synthesizer = AnswerSynthesizer::new(
        llm,
        "test-model",
        workspace,
        config.synthesis.clone(),
        timeout,
    )
    .unwrap();
    let cache = SemanticCache::new(embedder.clone(), config.cache.clone(), timeout);
    let memory = ConversationMemory::new(config.memory.clone());
    let retriever = ContextRetriever::new(
        embedder,
        index,
        config.retrieval.clone(),
        config.timeouts.clone(),
    );

    QueryPipeline::new(
        normalizer,
        Arc::new(cache),
        Arc::new(memory),
        retriever,
        synthesizer,
    )
}

/// A pipeline over the transcript corpus with working services.
pub(crate) async fn transcript_pipeline(llm: Arc<ScriptedLlm>, workspace: &Path) -> QueryPipeline {
    pipeline_with(
        llm,
        Arc::new(TrigramProvider::new(EMBEDDING_DIMS)),
        Arc::new(transcript_index().await),
        workspace,
    )
}
