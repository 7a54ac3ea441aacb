//! Follow-up question classification.
//!
//! An ordered table of named rules; the first rule that matches decides.
//! Classification runs on the corpus-language (normalized) text.

use unicode_segmentation::UnicodeSegmentation;

/// Pronouns and determiners that can point back at an earlier exchange.
const ANAPHORS: [&str; 7] = ["it", "that", "this", "they", "them", "those", "these"];

/// Anaphors that act as determiners when followed by a noun ("this planet").
const DETERMINERS: [&str; 4] = ["this", "that", "these", "those"];

const LEAD_PHRASES: [&str; 6] = [
    "tell me more",
    "more about",
    "what about",
    "how about",
    "and what",
    "but what",
];

const LEAD_WORDS: [&str; 4] = ["and", "but", "also", "so"];

/// Words that never name the thing a pronoun refers to.
const FUNCTION_WORDS: &[&str] = &[
    // question words
    "what", "why", "how", "when", "where", "who", "whom", "which", "whose",
    // auxiliaries
    "is", "are", "was", "were", "be", "been", "being", "do", "does", "did", "can", "could",
    "will", "would", "should", "shall", "may", "might", "must", "has", "have", "had",
    // articles, prepositions, conjunctions
    "a", "an", "the", "of", "in", "on", "at", "to", "for", "from", "with", "about", "by",
    "into", "than", "as", "and", "but", "or", "so", "if", "then",
    // personal pronouns
    "i", "you", "me", "we", "us", "he", "she", "him", "her", "my", "your", "our", "its",
    "their",
    // adverbs and generic verbs
    "not", "there", "much", "more", "very", "really", "also", "just", "exactly", "still",
    "tell", "explain", "describe", "mean", "means", "happen", "happens", "work", "works",
    "make", "makes", "get", "gets",
    // measuring adjectives
    "big", "small", "large", "long", "old", "far", "fast", "hot", "cold", "many", "few",
    "heavy", "dangerous", "important", "true", "real", "good", "bad",
];

/// Named follow-up heuristics, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpRule {
    /// At most N words
    ShortQuestion,
    /// A pronoun with no noun earlier in the question to refer to
    Anaphora,
    /// Known continuation phrases such as "tell me more"
    LeadPhrase,
}

impl FollowUpRule {
    pub const ORDER: [FollowUpRule; 3] = [
        FollowUpRule::ShortQuestion,
        FollowUpRule::Anaphora,
        FollowUpRule::LeadPhrase,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FollowUpRule::ShortQuestion => "short_question",
            FollowUpRule::Anaphora => "anaphora",
            FollowUpRule::LeadPhrase => "lead_phrase",
        }
    }

    fn matches(&self, words: &[&str], short_question_words: usize) -> bool {
        match self {
            FollowUpRule::ShortQuestion => words.len() <= short_question_words,
            FollowUpRule::Anaphora => has_dangling_anaphor(words),
            FollowUpRule::LeadPhrase => has_lead_phrase(words),
        }
    }
}

/// Classifies questions as follow-ups or new topics.
#[derive(Debug, Clone, Copy)]
pub struct FollowUpClassifier {
    short_question_words: usize,
}

impl FollowUpClassifier {
    pub fn new(short_question_words: usize) -> Self {
        Self {
            short_question_words,
        }
    }

    /// The first rule that matches, or `None` for a new topic.
    pub fn classify(&self, question: &str) -> Option<FollowUpRule> {
        let lower = question.to_lowercase();
        let words: Vec<&str> = lower.unicode_words().collect();

        FollowUpRule::ORDER
            .into_iter()
            .find(|rule| rule.matches(&words, self.short_question_words))
    }

    pub fn is_likely_follow_up(&self, question: &str) -> bool {
        self.classify(question).is_some()
    }
}

fn is_content_word(word: &str) -> bool {
    !FUNCTION_WORDS.contains(&word) && !ANAPHORS.contains(&word)
}

fn has_dangling_anaphor(words: &[&str]) -> bool {
    words.iter().enumerate().any(|(i, word)| {
        if !ANAPHORS.contains(word) {
            return false;
        }
        let used_as_determiner = DETERMINERS.contains(word)
            && words.get(i + 1).is_some_and(|next| is_content_word(next));
        if used_as_determiner {
            return false;
        }
        !words[..i].iter().any(|w| is_content_word(w))
    })
}

fn has_lead_phrase(words: &[&str]) -> bool {
    if words.first().is_some_and(|w| LEAD_WORDS.contains(w)) {
        return true;
    }
    let padded = format!(" {} ", words.join(" "));
    LEAD_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {} ", phrase)))
}
