//! Ask command handler.
//!
//! Answers one question through the RAG pipeline without moderation.

use crate::services;
use clap::Args;
use qna_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// Answer a question from the knowledge bases
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Print the retrieved context to stderr
    #[arg(long)]
    pub show_context: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.get_question()?;
        let (_encoder, retriever) = services::retriever(config)?;
        let pipeline = services::pipeline(config, retriever)?;

        let result = pipeline.answer(&question).await?;

        if self.show_context {
            for (name, section) in [
                ("main", &result.context.main),
                ("user", &result.context.user),
                ("conditions", &result.context.conditions),
            ] {
                for (i, text) in section.iter().enumerate() {
                    eprintln!("[{} {}] {}", name, i + 1, text);
                }
            }
        }

        if self.json {
            let output = serde_json::json!({
                "question": question,
                "answer": result.answer,
                "context": {
                    "main": result.context.main,
                    "user": result.context.user,
                    "conditions": result.context.conditions
                }
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", result.answer);
        }

        Ok(())
    }

    fn get_question(&self) -> AppResult<String> {
        let question = match (&self.question, &self.file) {
            (Some(question), _) => question.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => {
                return Err(AppError::Config("No question provided".to_string()));
            }
        };
        Ok(question.trim().to_string())
    }
}
