//! Answer types returned by the query pipeline.

use serde::{Deserialize, Serialize};

use crate::language::is_english;
use crate::types::{Confidence, Mode};

/// Answer returned when retrieval finds nothing, in the corpus language.
pub const NO_INFORMATION_ANSWER: &str =
    "I couldn't find relevant information in the video transcripts to answer your question.";

/// The response to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    /// Answer text in the response language
    pub answer: String,

    pub confidence: Confidence,

    /// Source video identifiers the answer draws on
    pub sources: Vec<String>,

    /// Response language (the detected question language)
    pub language: String,

    /// Whether the question was classified as a follow-up
    pub is_follow_up: bool,

    /// Whether speech output is available for `language`
    pub tts_available: bool,

    pub mode: Mode,

    /// Served from the semantic cache
    pub cached: bool,
}

impl StructuredAnswer {
    pub fn new(
        answer: impl Into<String>,
        confidence: Confidence,
        sources: Vec<String>,
        language: impl Into<String>,
        mode: Mode,
    ) -> Self {
        let language = language.into();
        Self {
            answer: answer.into(),
            confidence,
            sources,
            tts_available: is_english(&language),
            language,
            is_follow_up: false,
            mode,
            cached: false,
        }
    }

    pub fn with_follow_up(mut self, is_follow_up: bool) -> Self {
        self.is_follow_up = is_follow_up;
        self
    }

    pub fn from_cache(mut self) -> Self {
        self.cached = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tts_follows_language() {
        let english = StructuredAnswer::new("a", Confidence::High, vec![], "English", Mode::Normal);
        assert!(english.tts_available);

        let spanish = StructuredAnswer::new("a", Confidence::High, vec![], "Spanish", Mode::Normal);
        assert!(!spanish.tts_available);
    }

    #[test]
    fn test_serialized_shape() {
        let answer = StructuredAnswer::new(
            "Black holes bend light.",
            Confidence::Medium,
            vec!["Black Holes Explained".to_string()],
            "en",
            Mode::CrazyScientist,
        )
        .with_follow_up(true);

        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["confidence"], "medium");
        assert_eq!(json["mode"], "crazy_scientist");
        assert_eq!(json["is_follow_up"], true);
        assert_eq!(json["tts_available"], true);
        assert_eq!(json["cached"], false);
    }
}
