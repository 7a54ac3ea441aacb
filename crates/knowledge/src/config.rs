//! Query pipeline configuration.
//!
//! Read from the `pipeline:` section of `.sage/config.yaml`. Every field has a
//! default, so the section (or the whole file) may be absent.

use sage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tunables for the cache, memory, retrieval and synthesis stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimum cosine similarity for a cache hit
    #[serde(rename = "similarityThreshold", default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Maximum number of cached answers
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Seconds before an entry stops matching
    #[serde(rename = "ttlSecs", default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_similarity_threshold() -> f32 {
    0.90
}

fn default_capacity() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    86_400
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Pairs kept per session
    #[serde(rename = "maxHistory", default = "default_max_history")]
    pub max_history: usize,

    /// Pairs injected into a follow-up prompt
    #[serde(rename = "contextPairs", default = "default_context_pairs")]
    pub context_pairs: usize,

    /// Questions with at most this many words count as follow-ups
    #[serde(rename = "shortQuestionWords", default = "default_short_question_words")]
    pub short_question_words: usize,

    /// Stored answers are truncated to this many characters
    #[serde(rename = "maxAnswerChars", default = "default_max_answer_chars")]
    pub max_answer_chars: usize,
}

fn default_max_history() -> usize {
    4
}

fn default_context_pairs() -> usize {
    3
}

fn default_short_question_words() -> usize {
    2
}

fn default_max_answer_chars() -> usize {
    300
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            context_pairs: default_context_pairs(),
            short_question_words: default_short_question_words(),
            max_answer_chars: default_max_answer_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(rename = "topK", default = "default_top_k")]
    pub top_k: usize,

    /// Passages scoring below this are dropped (0.0 keeps everything)
    #[serde(rename = "minScore", default)]
    pub min_score: f32,
}

fn default_top_k() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(rename = "maxTokens", default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Language the transcripts are written in
    #[serde(rename = "corpusLanguage", default = "default_corpus_language")]
    pub corpus_language: String,
}

fn default_corpus_language() -> String {
    "English".to_string()
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            corpus_language: default_corpus_language(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(rename = "embeddingSecs", default = "default_service_secs")]
    pub embedding_secs: u64,

    #[serde(rename = "indexSecs", default = "default_service_secs")]
    pub index_secs: u64,

    #[serde(rename = "llmSecs", default = "default_llm_secs")]
    pub llm_secs: u64,
}

fn default_service_secs() -> u64 {
    10
}

fn default_llm_secs() -> u64 {
    60
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_secs: default_service_secs(),
            index_secs: default_service_secs(),
            llm_secs: default_llm_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn index(&self) -> Duration {
        Duration::from_secs(self.index_secs)
    }

    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Vector length; inferred from the provider and model when omitted
    #[serde(default)]
    pub dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ConfigFileView {
    #[serde(default)]
    pipeline: Option<PipelineConfig>,
}

impl PipelineConfig {
    /// Load the `pipeline` section from a config file.
    ///
    /// A missing file or section yields the defaults.
    pub fn load(config_path: &Path) -> AppResult<Self> {
        if !config_path.exists() {
            tracing::debug!("No config file at {:?}, using default pipeline config", config_path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let view: ConfigFileView = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!(
                "Failed to parse pipeline config at {:?}: {}",
                config_path, e
            ))
        })?;

        let config = view.pipeline.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> AppResult<()> {
        let threshold = self.cache.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(AppError::Config(format!(
                "cache.similarityThreshold must be in (0, 1], got {}",
                threshold
            )));
        }

        if self.cache.capacity == 0 {
            return Err(AppError::Config("cache.capacity must be at least 1".to_string()));
        }

        if self.memory.max_history == 0 {
            return Err(AppError::Config(
                "memory.maxHistory must be at least 1".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.topK must be at least 1".to_string()));
        }

        if self.language.corpus_language.trim().is_empty() {
            return Err(AppError::Config(
                "language.corpusLanguage cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.cache.similarity_threshold, 0.90);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.memory.max_history, 4);
        assert_eq!(config.memory.context_pairs, 3);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.language.corpus_language, "English");
        assert_eq!(config.timeouts.llm(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = PipelineConfig::load(&temp.path().join("config.yaml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            r#"
llm:
  activeProvider: ollama
pipeline:
  cache:
    similarityThreshold: 0.85
  memory:
    maxHistory: 6
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.cache.similarity_threshold, 0.85);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.memory.max_history, 6);
        assert_eq!(config.memory.max_answer_chars, 300);
    }

    #[test]
    fn test_file_without_pipeline_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "logging:\n  level: info\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.cache.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.memory.max_history = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }
}
