//! Embedding generation.
//!
//! Provider-agnostic text-to-vector conversion used by the semantic cache and
//! the context retriever.

pub mod config;
pub mod provider;
pub mod providers;
mod retry;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
