//! Command handlers for the Sage CLI.

pub mod ask;
pub mod chat;
pub mod stats;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use stats::StatsCommand;

use sage_core::AppResult;
use sage_knowledge::{Mode, StructuredAnswer};

/// Parse a `--mode` value.
pub(crate) fn parse_mode(value: &str) -> Result<Mode, String> {
    Mode::parse(value).ok_or_else(|| {
        format!(
            "unknown mode '{}' (expected normal or crazy_scientist)",
            value
        )
    })
}

/// Print an answer as pretty JSON or as text with its sources.
pub(crate) fn print_answer(answer: &StructuredAnswer, json: bool) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  - {}", source);
        }
    }

    let mut notes = vec![format!("confidence: {}", answer.confidence)];
    if answer.language != "English" {
        notes.push(format!("language: {}", answer.language));
    }
    if answer.is_follow_up {
        notes.push("follow-up".to_string());
    }
    if answer.cached {
        notes.push("cached".to_string());
    }
    println!("[{}]", notes.join(", "));

    Ok(())
}
