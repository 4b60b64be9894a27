//! End-to-end RAG answering: retrieve, assemble, generate.

use crate::context::{assemble, Context, ContextCaps, ContextFields};
use crate::rag::generator::AnswerGenerator;
use crate::retriever::{IndexKind, MultiIndexRetriever, RetrievedDocument};
use qna_core::config::RetrievalSettings;
use qna_core::AppResult;
use std::time::Instant;

/// An answer together with the context it was grounded in.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub context: Context,
}

/// Retrieval plus generation for one question at a time.
#[derive(Clone)]
pub struct RagPipeline {
    retriever: MultiIndexRetriever,
    generator: AnswerGenerator,
    caps: ContextCaps,
    fields: ContextFields,
    lookup_k: usize,
}

impl RagPipeline {
    pub fn new(retriever: MultiIndexRetriever, generator: AnswerGenerator) -> Self {
        Self {
            retriever,
            generator,
            caps: ContextCaps::default(),
            fields: ContextFields::default(),
            lookup_k: 5,
        }
    }

    /// Apply caps, field names and lookup size from the `retrieval` section.
    pub fn with_settings(mut self, settings: &RetrievalSettings) -> Self {
        self.caps = ContextCaps::from_settings(settings);
        self.fields = ContextFields::from_settings(settings);
        self.lookup_k = settings.classification_k;
        self
    }

    pub fn retriever(&self) -> &MultiIndexRetriever {
        &self.retriever
    }

    /// Answer a question from the three knowledge bases.
    pub async fn answer(&self, query: &str) -> AppResult<RagAnswer> {
        let start = Instant::now();

        let set = self.retriever.search_all(query, self.caps).await?;
        let context = assemble(&set.main, &set.user, &set.conditions, self.caps, &self.fields)?;

        tracing::debug!(
            "Context: {} main, {} user, {} conditions",
            context.main.len(),
            context.user.len(),
            context.conditions.len()
        );

        let answer = self
            .generator
            .generate(query, &context.main, &context.conditions, &context.user)
            .await?;

        tracing::info!(
            "RAG answer ready in {:.2}s",
            start.elapsed().as_secs_f64()
        );

        Ok(RagAnswer { answer, context })
    }

    /// The wider main knowledge base lookup used to enrich classification.
    pub async fn main_lookup(&self, query: &str) -> AppResult<Vec<RetrievedDocument>> {
        self.retriever
            .search(IndexKind::Main, query, self.lookup_k)
            .await
    }
}
