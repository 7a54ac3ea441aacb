//! Answer synthesis.
//!
//! Builds the answer prompt from passages, conversation context and the
//! question, then parses the model's JSON reply into an answer. A reply that
//! does not parse is retried once with stricter instructions; a second
//! failure, or a failed retry call, degrades to the reply's answer text with
//! low confidence and no sources.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sage_core::{AppError, AppResult};
use sage_llm::{LlmClient, LlmRequest};
use sage_prompt::{build_prompt, load_prompt, PromptDefinition};
use serde_json::Value;
use thiserror::Error;

use crate::config::SynthesisConfig;
use crate::memory::format_context;
use crate::service::{bounded, Service};
use crate::types::{Confidence, Mode, Passage, QaPair};

const FORMAT_INSTRUCTIONS: &str = r#"Reply with a single JSON object and nothing else:
{"answer": "<your answer>", "confidence": "high" | "medium" | "low", "sources": ["<video title>", ...]}
List in "sources" only the video titles you actually used, exactly as given above."#;

const STRICT_INSTRUCTIONS: &str = "Your previous reply could not be read. Reply with ONLY the JSON object described above: no markdown fences, no commentary, and a non-empty \"answer\" string.";

/// Why a model reply did not match the answer schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no JSON object in model output")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing or mistyped field '{0}'")]
    MissingField(&'static str),

    #[error("answer is empty")]
    EmptyAnswer,
}

/// What the synthesizer needs for one question.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    /// Question in the corpus language
    pub question: &'a str,
    /// Language the answer should be written in
    pub target_language: &'a str,
    pub passages: &'a [Passage],
    /// Recent exchanges; empty unless the question is a follow-up
    pub conversation: &'a [QaPair],
    pub mode: Mode,
}

/// A synthesized answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub answer: String,
    pub confidence: Confidence,
    pub sources: Vec<String>,
    /// The reply never matched the schema and the raw text was used
    pub degraded: bool,
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompts: HashMap<Mode, PromptDefinition>,
    config: SynthesisConfig,
    timeout: Duration,
}

impl AnswerSynthesizer {
    /// Loads the answer prompt for every mode up front.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: &Path,
        config: SynthesisConfig,
        timeout: Duration,
    ) -> AppResult<Self> {
        let mut prompts = HashMap::new();
        for mode in [Mode::Normal, Mode::CrazyScientist] {
            prompts.insert(mode, load_prompt(workspace, mode.prompt_id())?);
        }

        Ok(Self {
            llm,
            model: model.into(),
            prompts,
            config,
            timeout,
        })
    }

    /// Generate an answer.
    ///
    /// Only a failed or timed-out model call is an error (`AppError::Llm`);
    /// malformed replies are retried and then degraded.
    pub async fn synthesize(&self, request: SynthesisRequest<'_>) -> AppResult<Synthesis> {
        let first = self.complete(&request, false).await?;
        let first_error = match parse_answer(&first, request.passages) {
            Ok(synthesis) => return Ok(synthesis),
            Err(e) => e,
        };
        tracing::warn!("Model reply did not parse ({}), retrying with strict instructions", first_error);

        let second = match self.complete(&request, true).await {
            Ok(second) => second,
            Err(e) => {
                tracing::warn!("Strict retry failed ({}), using the first reply", e);
                return degrade("", &first);
            }
        };
        match parse_answer(&second, request.passages) {
            Ok(synthesis) => Ok(synthesis),
            Err(e) => {
                tracing::warn!("Model reply did not parse again ({}), using raw text", e);
                degrade(&second, &first)
            }
        }
    }

    async fn complete(&self, request: &SynthesisRequest<'_>, strict: bool) -> AppResult<String> {
        let definition = self.prompts.get(&request.mode).ok_or_else(|| {
            AppError::Prompt(format!("No answer prompt loaded for mode '{}'", request.mode))
        })?;

        let mut vars = HashMap::new();
        vars.insert("passages".to_string(), format_passages(request.passages));
        vars.insert("conversation".to_string(), format_context(request.conversation));
        vars.insert("question".to_string(), request.question.to_string());
        vars.insert("target_language".to_string(), request.target_language.to_string());
        vars.insert("format_instructions".to_string(), FORMAT_INSTRUCTIONS.to_string());
        if strict {
            vars.insert("strict_instructions".to_string(), STRICT_INSTRUCTIONS.to_string());
        }

        let built = build_prompt(definition, vars)?;
        let mut llm_request = LlmRequest::new(built.user, self.model.clone())
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        if let Some(system) = built.system {
            llm_request = llm_request.with_system(system);
        }
        if built.metadata.json_output {
            llm_request = llm_request.with_json_output();
        }

        tracing::debug!(
            mode = %request.mode,
            passages = request.passages.len(),
            context_pairs = request.conversation.len(),
            strict,
            "Calling generative model"
        );

        let response = bounded(Service::Llm, self.timeout, self.llm.complete(&llm_request)).await?;
        Ok(response.content)
    }
}

/// Number passages and attribute each to its source.
pub fn format_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] (Source: {})\n{}", i + 1, p.source, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse a reply against the answer schema.
///
/// Sources are limited to the retrieved passages' sources. When the reply has
/// no `sources` field at all, every retrieved source is used.
pub fn parse_answer(raw: &str, passages: &[Passage]) -> Result<Synthesis, ParseError> {
    let json = extract_json_object(raw).ok_or(ParseError::NoJsonObject)?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let answer = value
        .get("answer")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField("answer"))?
        .trim();
    if answer.is_empty() {
        return Err(ParseError::EmptyAnswer);
    }

    let confidence = match value.get("confidence") {
        Some(Value::String(level)) => Confidence::clipped(level),
        Some(_) => Confidence::Medium,
        None => return Err(ParseError::MissingField("confidence")),
    };

    let sources = match value.get("sources") {
        None | Some(Value::Null) => known_sources(passages),
        Some(Value::Array(items)) => {
            let cited: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            filter_sources(&cited, passages)
        }
        Some(_) => return Err(ParseError::MissingField("sources")),
    };

    Ok(Synthesis {
        answer: answer.to_string(),
        confidence,
        sources,
        degraded: false,
    })
}

/// The span from the first `{` to the last `}`, ignoring markdown fences.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Retrieved sources, deduplicated in retrieval order.
fn known_sources(passages: &[Passage]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for passage in passages {
        if !sources.contains(&passage.source) {
            sources.push(passage.source.clone());
        }
    }
    sources
}

/// Cited sources that match a retrieved source (case-insensitive), deduplicated.
fn filter_sources(cited: &[&str], passages: &[Passage]) -> Vec<String> {
    let known = known_sources(passages);
    let mut sources: Vec<String> = Vec::new();
    for name in cited {
        let name = name.trim();
        if let Some(source) = known.iter().find(|k| k.eq_ignore_ascii_case(name)) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
    }
    sources
}

/// Low-confidence answer from whichever reply has usable text.
///
/// Errors only when both replies are empty.
fn degrade(second: &str, first: &str) -> AppResult<Synthesis> {
    let text = [second, first]
        .into_iter()
        .find_map(salvage_text)
        .ok_or_else(|| AppError::Llm("Model returned an empty reply".to_string()))?;

    Ok(Synthesis {
        answer: text,
        confidence: Confidence::Low,
        sources: Vec::new(),
        degraded: true,
    })
}

/// The `answer` string of a JSON reply, else the reply with fences stripped.
fn salvage_text(raw: &str) -> Option<String> {
    let answer = extract_json_object(raw)
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .and_then(|value| {
            value
                .get("answer")
                .and_then(Value::as_str)
                .map(|a| a.trim().to_string())
        })
        .filter(|a| !a.is_empty());
    if answer.is_some() {
        return answer;
    }

    let text = strip_fences(raw).trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text)
}
