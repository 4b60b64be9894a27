//! Serve command handler.

use crate::services;
use clap::Args;
use qna_classify::SupportClassifier;
use qna_core::{config::AppConfig, AppResult};
use qna_server::{run_server, AppState};
use std::sync::Arc;

/// Run the HTTP API
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on (overrides server.bind)
    #[arg(long)]
    pub bind: Option<String>,

    /// Classify the retrieval-enriched question instead of the bare one
    #[arg(long)]
    pub with_context: bool,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");

        let (encoder, retriever) = services::retriever(config)?;
        let classifier = SupportClassifier::from_config(config, encoder)?;
        let pipeline = services::pipeline(config, retriever)?;

        let state = AppState::new(
            Arc::new(pipeline),
            Arc::new(classifier),
            config.retrieval.clone(),
            self.with_context || config.classifier.use_retrieval_context,
        );

        let bind = self.bind.as_deref().unwrap_or(&config.server.bind);
        run_server(bind, state).await
    }
}
