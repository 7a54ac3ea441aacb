//! Wiring from application configuration to a ready pipeline.

use std::sync::Arc;

use sage_core::config::IndexConfig;
use sage_core::{AppConfig, AppResult};

use crate::cache::SemanticCache;
use crate::config::PipelineConfig;
use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::index::InMemoryIndex;
use crate::language::LanguageNormalizer;
use crate::memory::ConversationMemory;
use crate::pinecone_index::{PineconeIndex, PineconeSettings};
use crate::rag::{AnswerSynthesizer, QueryPipeline};
use crate::retriever::ContextRetriever;
use crate::vector_index::VectorIndex;

/// Build the embedding provider the configuration names.
pub fn create_embedder(
    config: &AppConfig,
    pipeline: &PipelineConfig,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let embedding = EmbeddingConfig::from_app_config(
        config,
        pipeline.embedding.dimensions,
        pipeline.timeouts.embedding_secs,
    );
    let api_key = config.resolve_api_key(&embedding.provider);

    tracing::debug!(
        provider = %embedding.provider,
        model = %embedding.model,
        dimensions = embedding.dimensions,
        "Creating embedding provider"
    );
    create_provider(&embedding, api_key.as_deref())
}

/// Open the vector index the configuration names.
pub fn create_index(config: &AppConfig, pipeline: &PipelineConfig) -> AppResult<Arc<dyn VectorIndex>> {
    match &config.index {
        IndexConfig::Pinecone {
            host,
            namespace,
            text_field,
            source_field,
            ..
        } => {
            let api_key = config.resolve_index_api_key()?.unwrap_or_default();
            let index = PineconeIndex::new(PineconeSettings {
                host: host.clone(),
                api_key,
                namespace: namespace.clone(),
                text_field: text_field.clone(),
                source_field: source_field.clone(),
                timeout: pipeline.timeouts.index(),
            })?;
            Ok(Arc::new(index))
        }
        IndexConfig::Local { path } => {
            let path = config.resolve_workspace_path(path);
            Ok(Arc::new(InMemoryIndex::load_jsonl(&path)?))
        }
    }
}

/// Build a pipeline with fresh cache and memory from configuration.
pub fn build_pipeline(config: &AppConfig) -> AppResult<QueryPipeline> {
    config.validate()?;
    let pipeline = PipelineConfig::load(&config.config_path())?;

    let provider_config = config.get_provider_config(&config.provider);
    let llm = sage_llm::create_client(
        &config.provider,
        provider_config.and_then(|p| p.endpoint()),
        config.resolve_api_key(&config.provider).as_deref(),
        pipeline.timeouts.llm(),
    )?;

    let embedder = create_embedder(config, &pipeline)?;
    let index = create_index(config, &pipeline)?;

    tracing::info!(
        provider = %config.provider,
        model = %config.model,
        embedder = embedder.provider_name(),
        index = index.backend_name(),
        "Query pipeline ready"
    );

    let normalizer = LanguageNormalizer::new(
        llm.clone(),
        config.model.clone(),
        &config.workspace,
        pipeline.language.corpus_language.clone(),
        pipeline.timeouts.llm(),
    )?;
    let synthesizer = AnswerSynthesizer::new(
        llm,
        config.model.clone(),
        &config.workspace,
        pipeline.synthesis.clone(),
        pipeline.timeouts.llm(),
    )?;
    let cache = SemanticCache::new(
        embedder.clone(),
        pipeline.cache.clone(),
        pipeline.timeouts.embedding(),
    );
    let memory = ConversationMemory::new(pipeline.memory.clone());
    let retriever = ContextRetriever::new(
        embedder,
        index,
        pipeline.retrieval.clone(),
        pipeline.timeouts.clone(),
    );

    Ok(QueryPipeline::new(
        normalizer,
        Arc::new(cache),
        Arc::new(memory),
        retriever,
        synthesizer,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn local_config(workspace: &std::path::Path) -> AppConfig {
        AppConfig {
            workspace: workspace.to_path_buf(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_missing_local_corpus_is_retrieval_error() {
        let temp = TempDir::new().unwrap();
        let config = local_config(temp.path());
        let result = create_index(&config, &PipelineConfig::default());
        assert!(matches!(result, Err(sage_core::AppError::Retrieval(_))));
    }

    #[tokio::test]
    async fn test_local_corpus_resolves_against_workspace() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".sage")).unwrap();
        fs::write(
            temp.path().join(".sage/corpus.jsonl"),
            r#"{"id":"p1","text":"Stars","source":"The Sun","embedding":[1.0,0.0]}"#,
        )
        .unwrap();

        let config = local_config(temp.path());
        let index = create_index(&config, &PipelineConfig::default()).unwrap();
        assert_eq!(index.backend_name(), "local");
        assert_eq!(index.stats().await.unwrap().vector_count, 1);
    }

    #[test]
    fn test_embedder_follows_dimension_override() {
        let temp = TempDir::new().unwrap();
        let mut pipeline = PipelineConfig::default();
        pipeline.embedding.dimensions = Some(64);

        let mut config = local_config(temp.path());
        config.llm = Some(sage_core::config::LlmConfig {
            active_provider: "ollama".to_string(),
            active_embedding_provider: "trigram".to_string(),
            providers: Default::default(),
        });

        let embedder = create_embedder(&config, &pipeline).unwrap();
        assert_eq!(embedder.provider_name(), "trigram");
        assert_eq!(embedder.dimensions(), 64);
    }

    #[test]
    fn test_build_pipeline_with_local_corpus() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".sage")).unwrap();
        fs::write(temp.path().join(".sage/corpus.jsonl"), "").unwrap();

        let config = local_config(temp.path());
        let pipeline = build_pipeline(&config).unwrap();
        assert_eq!(pipeline.index_backend(), "local");
    }
}
