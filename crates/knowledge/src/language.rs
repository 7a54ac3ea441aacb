//! Language normalization.
//!
//! Questions arrive in any language but the transcripts are in one corpus
//! language. The normalizer asks the generative model to name the question's
//! language and translate it, and translates answers back.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sage_core::AppResult;
use sage_llm::{LlmClient, LlmRequest};
use sage_prompt::builtin::{LANGUAGE_DETECT, LANGUAGE_TRANSLATE};
use sage_prompt::{build_prompt, load_prompt, PromptDefinition};

use crate::service::{bounded, Service};
use crate::types::Question;

/// Detects question language and translates between it and the corpus language.
pub struct LanguageNormalizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    corpus_language: String,
    timeout: Duration,
    detect_prompt: PromptDefinition,
    translate_prompt: PromptDefinition,
}

impl LanguageNormalizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: &Path,
        corpus_language: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        Ok(Self {
            llm,
            model: model.into(),
            corpus_language: corpus_language.into(),
            timeout,
            detect_prompt: load_prompt(workspace, LANGUAGE_DETECT)?,
            translate_prompt: load_prompt(workspace, LANGUAGE_TRANSLATE)?,
        })
    }

    pub fn corpus_language(&self) -> &str {
        &self.corpus_language
    }

    /// Detect the language of `raw` and translate it into the corpus language.
    ///
    /// Fails only when the model call fails; an unparseable reply falls back
    /// to the corpus language and the raw text.
    pub async fn normalize(&self, raw: &str) -> AppResult<Question> {
        let mut vars = HashMap::new();
        vars.insert("text".to_string(), raw.to_string());
        vars.insert("corpus_language".to_string(), self.corpus_language.clone());

        let reply = self.complete(&self.detect_prompt, vars).await?;
        let question = parse_detection(&reply, raw, &self.corpus_language);

        tracing::debug!(
            language = %question.language,
            translated = question.normalized != question.raw,
            "Normalized question"
        );

        Ok(question)
    }

    /// A question treated as already being in the corpus language.
    pub fn passthrough(&self, raw: &str) -> Question {
        Question::untranslated(raw, self.corpus_language.clone())
    }

    /// Translate `text` into `target`.
    ///
    /// Returns the input unchanged when `target` is the corpus language or
    /// when translation fails.
    pub async fn translate(&self, text: &str, target: &str) -> String {
        if is_same_language(target, &self.corpus_language) || text.trim().is_empty() {
            return text.to_string();
        }

        let mut vars = HashMap::new();
        vars.insert("text".to_string(), text.to_string());
        vars.insert("target_language".to_string(), target.to_string());

        match self.complete(&self.translate_prompt, vars).await {
            Ok(reply) if !reply.trim().is_empty() => strip_quotes(reply.trim()).to_string(),
            Ok(_) => {
                tracing::warn!("Empty translation into {}, keeping original text", target);
                text.to_string()
            }
            Err(e) => {
                tracing::warn!("Translation into {} failed: {}", target, e);
                text.to_string()
            }
        }
    }

    async fn complete(
        &self,
        definition: &PromptDefinition,
        vars: HashMap<String, String>,
    ) -> AppResult<String> {
        let built = build_prompt(definition, vars)?;
        let mut request = LlmRequest::new(built.user, self.model.clone()).with_temperature(0.0);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        let response = bounded(Service::Llm, self.timeout, self.llm.complete(&request)).await?;
        Ok(response.content)
    }
}

/// Whether two language labels name the same language ("English", "english", "en", "en-US").
pub fn is_same_language(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    a == b || (is_english(&a) && is_english(&b))
}

/// Whether a language label names English.
pub fn is_english(language: &str) -> bool {
    let language = language.trim().to_lowercase();
    language == "english" || language == "en" || language.starts_with("en-") || language.starts_with("en_")
}

/// Parse a `Language:` / `Translation:` reply.
fn parse_detection(reply: &str, raw: &str, corpus_language: &str) -> Question {
    let mut language = None;
    let mut translation = None;

    for line in reply.lines() {
        let line = line.trim();
        if let Some(value) = strip_label(line, "language:") {
            language = Some(value.to_string());
        } else if let Some(value) = strip_label(line, "translation:") {
            translation = Some(strip_quotes(value).to_string());
        }
    }

    let language = language
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| corpus_language.to_string());

    let normalized = if is_same_language(&language, corpus_language) {
        raw.to_string()
    } else {
        translation
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| raw.to_string())
    };

    Question {
        raw: raw.to_string(),
        language,
        normalized,
    }
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}

fn strip_quotes(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}
