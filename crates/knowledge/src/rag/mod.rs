//! Retrieval-augmented answering.
//!
//! The synthesizer turns passages into a structured answer; the pipeline
//! sequences normalization, caching, retrieval, synthesis and memory.

pub mod pipeline;
pub mod synthesis;
pub mod types;

pub use pipeline::QueryPipeline;
pub use synthesis::{AnswerSynthesizer, ParseError, Synthesis, SynthesisRequest};
pub use types::{StructuredAnswer, NO_INFORMATION_ANSWER};
