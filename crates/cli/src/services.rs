//! Model services shared by the commands.
//!
//! Everything here is created once per process and handed to the server or
//! the bot as `Arc`s.

use qna_core::{AppConfig, AppResult};
use qna_knowledge::{
    create_provider, AnswerGenerator, EmbeddingProvider, MultiIndexRetriever, RagPipeline,
};
use qna_llm::{create_client, GenerationConfig, GenerationWorker};
use qna_prompt::{load_prompt, DEFAULT_PROMPT_ID};
use std::sync::Arc;

/// Sentence encoder plus the three loaded indexes.
pub fn retriever(config: &AppConfig) -> AppResult<(Arc<dyn EmbeddingProvider>, MultiIndexRetriever)> {
    let encoder = create_provider(&config.embedding)?;
    tracing::debug!(
        "Encoder: {} / {} ({} dims)",
        encoder.provider_name(),
        encoder.model_name(),
        encoder.dimensions()
    );

    let retriever = MultiIndexRetriever::from_config(config, encoder.clone())?;
    Ok((encoder, retriever))
}

/// The full RAG pipeline with generation behind the single-flight worker.
///
/// Must be called inside the runtime: it spawns the worker task.
pub fn pipeline(config: &AppConfig, retriever: MultiIndexRetriever) -> AppResult<RagPipeline> {
    let client = create_client(&config.llm)?;
    let (worker, _task) = GenerationWorker::spawn(client, config.llm.queue_capacity);

    let decoding = GenerationConfig::from_settings(&config.llm, &config.workspace)?;
    let definition = load_prompt(&config.workspace, DEFAULT_PROMPT_ID)?;
    tracing::debug!("Loaded prompt definition: {}", definition.id);

    let generator =
        AnswerGenerator::from_settings(Arc::new(worker), definition, &config.llm, decoding)?;

    Ok(RagPipeline::new(retriever, generator).with_settings(&config.retrieval))
}
