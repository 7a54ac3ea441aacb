//! Per-session conversation memory.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::MemoryConfig;
use crate::followup::{FollowUpClassifier, FollowUpRule};
use crate::types::QaPair;

/// Answers in a snapshot are cut to this many characters.
const SNAPSHOT_ANSWER_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub active_sessions: usize,
    pub total_pairs: usize,
    pub max_history: usize,
}

/// A read-only view of one session's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    pub qa_pairs: Vec<QaPair>,
    pub count: usize,
    /// The most recent question, if any
    pub last_topic: Option<String>,
}

/// Bounded FIFO history of Q&A pairs per session.
pub struct ConversationMemory {
    sessions: Mutex<HashMap<String, VecDeque<QaPair>>>,
    config: MemoryConfig,
    classifier: FollowUpClassifier,
}

impl ConversationMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            classifier: FollowUpClassifier::new(config.short_question_words),
            config,
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Append a pair, dropping the oldest once the session exceeds `max_history`.
    pub async fn add_pair(&self, session_id: &str, question: &str, answer: &str) {
        let pair = QaPair {
            question: question.to_string(),
            answer: truncate_chars(answer, self.config.max_answer_chars),
            timestamp: Utc::now(),
        };

        let mut sessions = self.sessions.lock().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push_back(pair);
        while history.len() > self.config.max_history {
            history.pop_front();
        }

        tracing::debug!(session = session_id, pairs = history.len(), "Stored exchange");
    }

    /// Up to `max_pairs` most recent pairs, oldest first.
    pub async fn get_recent_context(&self, session_id: &str, max_pairs: usize) -> Vec<QaPair> {
        let sessions = self.sessions.lock().await;
        match sessions.get(session_id) {
            Some(history) => {
                let skip = history.len().saturating_sub(max_pairs);
                history.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub async fn has_history(&self, session_id: &str) -> bool {
        let sessions = self.sessions.lock().await;
        sessions.get(session_id).is_some_and(|h| !h.is_empty())
    }

    /// Forget a session. Unknown sessions are ignored.
    pub async fn clear(&self, session_id: &str) {
        if self.sessions.lock().await.remove(session_id).is_some() {
            tracing::debug!(session = session_id, "Cleared conversation");
        }
    }

    pub async fn stats(&self) -> MemoryStats {
        let sessions = self.sessions.lock().await;
        MemoryStats {
            active_sessions: sessions.len(),
            total_pairs: sessions.values().map(VecDeque::len).sum(),
            max_history: self.config.max_history,
        }
    }

    pub async fn snapshot(&self, session_id: &str) -> ConversationSnapshot {
        let sessions = self.sessions.lock().await;
        let qa_pairs: Vec<QaPair> = sessions
            .get(session_id)
            .map(|history| {
                history
                    .iter()
                    .map(|p| QaPair {
                        answer: truncate_chars(&p.answer, SNAPSHOT_ANSWER_CHARS),
                        ..p.clone()
                    })
                    .collect()
            })
            .unwrap_or_default();

        ConversationSnapshot {
            count: qa_pairs.len(),
            last_topic: qa_pairs.last().map(|p| p.question.clone()),
            qa_pairs,
        }
    }

    /// Which follow-up rule fires for `question`, if any.
    pub fn classify(&self, question: &str) -> Option<FollowUpRule> {
        self.classifier.classify(question)
    }

    pub fn is_likely_follow_up(&self, question: &str) -> bool {
        self.classifier.is_likely_follow_up(question)
    }
}

/// Render pairs as prompt context, numbered from 1.
pub fn format_context(pairs: &[QaPair]) -> String {
    pairs
        .iter()
        .enumerate()
        .map(|(i, p)| format!("Recent Q{n}: {}\nRecent A{n}: {}", p.question, p.answer, n = i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to `max` characters, appending "..." when anything was dropped.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> ConversationMemory {
        ConversationMemory::new(MemoryConfig::default())
    }

    #[tokio::test]
    async fn test_history_is_bounded_fifo() {
        let memory = memory();
        for i in 1..=5 {
            memory
                .add_pair("s1", &format!("question {}", i), &format!("answer {}", i))
                .await;
        }

        let recent = memory.get_recent_context("s1", 10).await;
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].question, "question 2");
        assert_eq!(recent[3].question, "question 5");
        assert!(recent.iter().all(|p| p.question != "question 1"));
    }

    #[tokio::test]
    async fn test_recent_context_is_oldest_first() {
        let memory = memory();
        for i in 1..=4 {
            memory.add_pair("s1", &format!("q{}", i), "a").await;
        }

        let recent = memory.get_recent_context("s1", 2).await;
        let questions: Vec<&str> = recent.iter().map(|p| p.question.as_str()).collect();
        assert_eq!(questions, vec!["q3", "q4"]);
    }

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let memory = memory();
        assert!(memory.get_recent_context("nobody", 3).await.is_empty());
        assert!(!memory.has_history("nobody").await);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let memory = memory();
        memory.add_pair("s1", "q", "a").await;

        memory.clear("s1").await;
        assert!(memory.get_recent_context("s1", 3).await.is_empty());
        memory.clear("s1").await;
        assert!(memory.get_recent_context("s1", 3).await.is_empty());
        memory.clear("never-seen").await;
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let memory = memory();
        memory.add_pair("a", "qa", "aa").await;
        memory.add_pair("b", "qb", "ab").await;
        memory.clear("a").await;

        assert_eq!(memory.get_recent_context("b", 3).await.len(), 1);
        let stats = memory.stats().await;
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.total_pairs, 1);
        assert_eq!(stats.max_history, 4);
    }

    #[tokio::test]
    async fn test_long_answers_are_truncated() {
        let memory = memory();
        let long = "é".repeat(400);
        memory.add_pair("s1", "q", &long).await;

        let stored = &memory.get_recent_context("s1", 1).await[0].answer;
        assert_eq!(stored.chars().count(), 303);
        assert!(stored.ends_with("..."));
    }

    #[tokio::test]
    async fn test_snapshot() {
        let memory = memory();
        memory.add_pair("s1", "What are black holes?", &"x".repeat(150)).await;
        memory.add_pair("s1", "How big are they?", "Very big.").await;

        let snapshot = memory.snapshot("s1").await;
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.last_topic.as_deref(), Some("How big are they?"));
        assert_eq!(snapshot.qa_pairs[0].answer.chars().count(), 103);

        let empty = memory.snapshot("other").await;
        assert_eq!(empty.count, 0);
        assert!(empty.last_topic.is_none());
    }

    #[test]
    fn test_format_context() {
        let now = Utc::now();
        let pairs = vec![
            QaPair {
                question: "What are black holes?".to_string(),
                answer: "Collapsed stars.".to_string(),
                timestamp: now,
            },
            QaPair {
                question: "How big are they?".to_string(),
                answer: "It varies.".to_string(),
                timestamp: now,
            },
        ];
        assert_eq!(
            format_context(&pairs),
            "Recent Q1: What are black holes?\nRecent A1: Collapsed stars.\nRecent Q2: How big are they?\nRecent A2: It varies."
        );
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exactly", 7), "exactly");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
    }

    #[test]
    fn test_follow_up_delegates_to_rules() {
        let memory = memory();
        assert!(memory.is_likely_follow_up("Tell me more"));
        assert!(!memory.is_likely_follow_up("What are black holes?"));
        assert_eq!(memory.classify("How big are they?"), Some(FollowUpRule::Anaphora));
    }
}
