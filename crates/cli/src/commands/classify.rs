//! Classify command handler.

use crate::services;
use clap::Args;
use qna_classify::{enriched_text, SupportClassifier};
use qna_core::{config::AppConfig, AppResult};
use qna_knowledge::IndexKind;

/// Classify a question along both taxonomy dimensions
#[derive(Args, Debug)]
pub struct ClassifyCommand {
    /// The question to classify
    pub question: String,

    /// Classify the retrieval-enriched question instead of the bare one
    #[arg(long)]
    pub with_context: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ClassifyCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing classify command");

        let (encoder, retriever) = services::retriever(config)?;
        let classifier = SupportClassifier::from_config(config, encoder)?;

        let text = if self.with_context || config.classifier.use_retrieval_context {
            let documents = retriever
                .search(
                    IndexKind::Main,
                    &self.question,
                    config.retrieval.classification_k,
                )
                .await?;
            enriched_text(&self.question, &documents, &config.retrieval)?
        } else {
            self.question.clone()
        };
        tracing::debug!("Classifying: {}", text);

        let result = classifier.classify(&text).await?;

        if self.json {
            let output = serde_json::json!({
                "class_1": result.class_1,
                "class_2": result.class_2
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}\n{}", result.class_1, result.class_2);
        }

        Ok(())
    }
}
