//! Stats command handler.
//!
//! Reports the vector index size and the effective pipeline configuration.

use clap::Args;
use sage_core::{config::AppConfig, AppResult};
use sage_knowledge::{create_embedder, create_index, PipelineConfig};
use sage_prompt::list_prompts;

/// Show index and pipeline statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        config.validate()?;
        let pipeline = PipelineConfig::load(&config.config_path())?;
        let embedder = create_embedder(config, &pipeline)?;
        let index = create_index(config, &pipeline)?;
        let index_stats = index.stats().await?;
        let prompts = list_prompts(&config.workspace)?;

        if index_stats.vector_count == 0 {
            tracing::warn!(
                "The {} index is empty; every question will get a no-information answer",
                index.backend_name()
            );
        }

        if self.json {
            let output = serde_json::json!({
                "index": {
                    "backend": index.backend_name(),
                    "vectorCount": index_stats.vector_count,
                },
                "embedding": {
                    "provider": embedder.provider_name(),
                    "model": embedder.model_name(),
                    "dimensions": embedder.dimensions(),
                },
                "llm": {
                    "provider": config.provider,
                    "model": config.model,
                },
                "pipeline": pipeline,
                "prompts": prompts,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("Index:      {} ({} vectors)", index.backend_name(), index_stats.vector_count);
        println!(
            "Embeddings: {} / {} ({} dims)",
            embedder.provider_name(),
            embedder.model_name(),
            embedder.dimensions()
        );
        println!("Model:      {} / {}", config.provider, config.model);
        println!(
            "Cache:      threshold {:.2}, capacity {}, ttl {}s",
            pipeline.cache.similarity_threshold, pipeline.cache.capacity, pipeline.cache.ttl_secs
        );
        println!(
            "Memory:     {} exchanges per session, {} used as context",
            pipeline.memory.max_history, pipeline.memory.context_pairs
        );
        println!(
            "Retrieval:  top {} passages, min score {:.2}",
            pipeline.retrieval.top_k, pipeline.retrieval.min_score
        );
        println!("Language:   {}", pipeline.language.corpus_language);
        println!("Prompts:    {}", prompts.join(", "));

        Ok(())
    }
}
