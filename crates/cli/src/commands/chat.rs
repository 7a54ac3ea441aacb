//! Chat command handler.
//!
//! Runs a multi-turn conversation in one process, so the semantic cache and
//! conversation memory carry over between turns.

use clap::Args;
use sage_core::{config::AppConfig, AppResult};
use sage_knowledge::{build_pipeline, Mode, QueryPipeline};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{parse_mode, print_answer};

/// Interactive multi-turn conversation
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Conversation session id
    #[arg(short, long, default_value = "chat")]
    pub session: String,

    /// Answer persona (normal, crazy_scientist)
    #[arg(long, default_value = "normal", value_parser = parse_mode)]
    pub mode: Mode,
}

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Question(&'a str),
    Clear,
    History,
    Stats,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/clear" => Input::Clear,
        "/history" => Input::History,
        "/stats" => Input::Stats,
        "/help" => Input::Help,
        "/quit" | "/exit" => Input::Quit,
        cmd if cmd.starts_with('/') => Input::Unknown(cmd),
        question => Input::Question(question),
    }
}

const HELP: &str = "Ask anything, in any language. Commands: /clear /history /stats /help /quit";

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command for session '{}'", self.session);

        let pipeline = build_pipeline(config)?;
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all(b"\n> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_input(&line) {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Help => println!("{}", HELP),
                Input::Unknown(cmd) => println!("Unknown command {}. {}", cmd, HELP),
                Input::Clear => {
                    pipeline.memory().clear(&self.session).await;
                    println!("Conversation cleared.");
                }
                Input::History => self.print_history(&pipeline).await,
                Input::Stats => print_stats(&pipeline).await,
                Input::Question(question) => {
                    match pipeline.ask(question, &self.session, self.mode).await {
                        Ok(answer) => print_answer(&answer, false)?,
                        Err(e) => {
                            tracing::warn!("Question failed: {}", e);
                            println!("Sorry, I couldn't answer that: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn print_history(&self, pipeline: &QueryPipeline) {
        let snapshot = pipeline.memory().snapshot(&self.session).await;
        if snapshot.count == 0 {
            println!("No conversation yet.");
            return;
        }
        for (i, pair) in snapshot.qa_pairs.iter().enumerate() {
            println!("Q{}: {}", i + 1, pair.question);
            println!("A{}: {}", i + 1, pair.answer);
        }
    }
}

async fn print_stats(pipeline: &QueryPipeline) {
    let cache = pipeline.cache().stats().await;
    let memory = pipeline.memory().stats().await;
    println!(
        "Cache: {}/{} entries (threshold {:.2}, ttl {}s)",
        cache.entries, cache.capacity, cache.similarity_threshold, cache.ttl_secs
    );
    println!(
        "Memory: {} sessions, {} exchanges (max {} per session)",
        memory.active_sessions, memory.total_pairs, memory.max_history
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  "), Input::Empty);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("/history"), Input::History);
        assert_eq!(parse_input("/dance"), Input::Unknown("/dance"));
        assert_eq!(
            parse_input(" How big are they? "),
            Input::Question("How big are they?")
        );
    }
}
