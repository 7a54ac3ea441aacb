//! Shared query pipeline types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A question after language normalization.
///
/// `normalized` is the text in the corpus language and drives retrieval,
/// caching and follow-up classification; `language` is the response language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub raw: String,
    pub language: String,
    pub normalized: String,
}

impl Question {
    /// A question already in the corpus language.
    pub fn untranslated(raw: impl Into<String>, language: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            normalized: raw.clone(),
            raw,
            language: language.into(),
        }
    }
}

/// A transcript passage returned by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Index-assigned identifier
    pub id: String,

    /// Transcript text
    pub text: String,

    /// Source video identifier (usually the video title)
    pub source: String,

    /// Similarity to the query, assigned at retrieval time
    pub score: f32,
}

/// One question/answer exchange in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Answer persona.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Normal,
    CrazyScientist,
}

impl Mode {
    /// Parse a mode name; accepts `crazy-scientist` as well.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "normal" => Some(Self::Normal),
            "crazy_scientist" => Some(Self::CrazyScientist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::CrazyScientist => "crazy_scientist",
        }
    }

    /// Id of the answer prompt for this persona.
    pub fn prompt_id(&self) -> &'static str {
        match self {
            Self::Normal => sage_prompt::builtin::ANSWER_NORMAL,
            Self::CrazyScientist => sage_prompt::builtin::ANSWER_CRAZY_SCIENTIST,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model-reported confidence in an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Parse a model-reported level; anything unrecognised becomes `Medium`.
    pub fn clipped(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clipping() {
        assert_eq!(Confidence::clipped("HIGH"), Confidence::High);
        assert_eq!(Confidence::clipped(" low "), Confidence::Low);
        assert_eq!(Confidence::clipped("medium"), Confidence::Medium);
        assert_eq!(Confidence::clipped("very sure"), Confidence::Medium);
        assert_eq!(Confidence::clipped(""), Confidence::Medium);
    }

    #[test]
    fn test_mode_parse_and_serde() {
        assert_eq!(Mode::parse("crazy-scientist"), Some(Mode::CrazyScientist));
        assert_eq!(Mode::parse("Normal"), Some(Mode::Normal));
        assert_eq!(Mode::parse("rick"), None);
        assert_eq!(
            serde_json::to_string(&Mode::CrazyScientist).unwrap(),
            "\"crazy_scientist\""
        );
        assert_eq!(Mode::default(), Mode::Normal);
    }

    #[test]
    fn test_mode_prompt_ids_differ() {
        assert_ne!(Mode::Normal.prompt_id(), Mode::CrazyScientist.prompt_id());
    }

    #[test]
    fn test_untranslated_question() {
        let q = Question::untranslated("What is a star?", "English");
        assert_eq!(q.normalized, q.raw);
        assert_eq!(q.language, "English");
    }
}
