//! Embedding configuration.

use sage_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Settings needed to build an embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "mock", "ollama", "openai"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per text before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Model used when the provider block names none.
fn default_model(provider: &str) -> &'static str {
    match provider {
        "ollama" => "nomic-embed-text",
        "openai" => "text-embedding-ada-002",
        _ => "trigram-v1",
    }
}

/// Known vector lengths for common models.
pub fn default_dimensions(provider: &str, model: &str) -> usize {
    match (provider, model) {
        ("openai", "text-embedding-3-large") => 3072,
        ("openai", _) => 1536,
        ("ollama", "mxbai-embed-large") => 1024,
        ("ollama", "all-minilm") => 384,
        ("ollama", _) => 768,
        _ => 384,
    }
}

impl EmbeddingConfig {
    /// Derive the embedding settings from application configuration.
    pub fn from_app_config(config: &AppConfig, dimensions: Option<usize>, timeout_secs: u64) -> Self {
        let provider = config.embedding_provider().to_lowercase();
        let provider_config = config.get_provider_config(&provider);

        let model = provider_config
            .and_then(|p| p.embedding_model())
            .unwrap_or(default_model(&provider))
            .to_string();

        Self {
            dimensions: dimensions.unwrap_or_else(|| default_dimensions(&provider, &model)),
            endpoint: provider_config.and_then(|p| p.endpoint()).map(str::to_string),
            timeout_secs,
            max_retries: default_max_retries(),
            model,
            provider,
        }
    }

    /// Check a vector returned by a provider against the configured length.
    pub fn check_dimensions(&self, got: usize) -> AppResult<()> {
        if got != self.dimensions {
            return Err(AppError::Embedding(format!(
                "Dimension mismatch for {}/{}: expected {}, got {}",
                self.provider, self.model, self.dimensions, got
            )));
        }
        Ok(())
    }
}
