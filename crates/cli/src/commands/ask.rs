//! Ask command handler.

use clap::Args;
use sage_core::{config::AppConfig, AppError, AppResult};
use sage_knowledge::{build_pipeline, Mode};
use std::path::PathBuf;

use super::{parse_mode, print_answer};

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask, in any language
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Conversation session id (default: a fresh session)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Answer persona (normal, crazy_scientist)
    #[arg(long, default_value = "normal", value_parser = parse_mode)]
    pub mode: Mode,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.read_question()?;
        let session = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let pipeline = build_pipeline(config)?;
        let answer = pipeline.ask(&question, &session, self.mode).await?;

        print_answer(&answer, self.json)
    }

    fn read_question(&self) -> AppResult<String> {
        if let Some(question) = &self.question {
            return Ok(question.clone());
        }
        match &self.file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Validation(format!("Failed to read question from {:?}: {}", path, e))
            }),
            None => Err(AppError::Validation("No question provided".to_string())),
        }
    }
}
