//! Multilingual question answering over video transcripts.
//!
//! The [`QueryPipeline`] turns a question and a session id into a
//! [`StructuredAnswer`]: it normalizes the question's language, checks the
//! [`SemanticCache`], retrieves transcript passages, synthesizes an answer
//! with the generative model and records the exchange in
//! [`ConversationMemory`].

pub mod cache;
pub mod config;
pub mod embeddings;
pub mod factory;
pub mod followup;
pub mod index;
pub mod language;
pub mod memory;
pub mod pinecone_index;
pub mod rag;
pub mod retriever;
pub mod service;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use cache::{CacheEntry, CacheLookup, CacheStats, SemanticCache};
pub use config::PipelineConfig;
pub use factory::{build_pipeline, create_embedder, create_index};
pub use followup::{FollowUpClassifier, FollowUpRule};
pub use language::LanguageNormalizer;
pub use memory::{ConversationMemory, ConversationSnapshot, MemoryStats};
pub use rag::{QueryPipeline, StructuredAnswer};
pub use retriever::ContextRetriever;
pub use types::{Confidence, Mode, Passage, QaPair, Question};
pub use vector_index::{IndexStats, VectorIndex};
