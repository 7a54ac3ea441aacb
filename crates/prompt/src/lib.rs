//! Prompt system for Sage.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - A built-in prompt set compiled into the binary
//! - Per-workspace overrides under `.sage/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec};
