//! Question classifiers.

use crate::head::LinearHead;
use crate::labels::LabelRegistry;
use qna_core::config::RetrievalSettings;
use qna_core::{AppConfig, AppError, AppResult};
use qna_knowledge::{normalize, EmbeddingProvider, RetrievedDocument};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Labels for both taxonomy dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub class_1: String,
    pub class_2: String,
}

/// Maps a text to one label of a closed set.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> AppResult<String>;
}

/// Encoder embedding followed by a linear head.
pub struct HeadClassifier {
    name: String,
    encoder: Arc<dyn EmbeddingProvider>,
    head: LinearHead,
    labels: LabelRegistry,
}

impl HeadClassifier {
    /// Pair a head with its labels, checking shapes against the encoder.
    pub fn new(
        name: impl Into<String>,
        encoder: Arc<dyn EmbeddingProvider>,
        head: LinearHead,
        labels: LabelRegistry,
    ) -> AppResult<Self> {
        let name = name.into();

        if head.n_classes() != labels.len() {
            return Err(AppError::Classification(format!(
                "Head '{}' has {} classes but {} labels are known",
                name,
                head.n_classes(),
                labels.len()
            )));
        }

        if head.dims() != encoder.dimensions() {
            return Err(AppError::Classification(format!(
                "Head '{}' expects {} dimensions but the encoder produces {}",
                name,
                head.dims(),
                encoder.dimensions()
            )));
        }

        Ok(Self {
            name,
            encoder,
            head,
            labels,
        })
    }

    pub fn labels(&self) -> &LabelRegistry {
        &self.labels
    }
}

#[async_trait::async_trait]
impl Classifier for HeadClassifier {
    async fn classify(&self, text: &str) -> AppResult<String> {
        let normalized = normalize(text);
        let embedding = self.encoder.embed(&normalized).await?;
        let index = self.head.predict(&embedding)?;

        let label = self.labels.label_of(index).ok_or_else(|| {
            AppError::Classification(format!("Head '{}' predicted unknown index {}", self.name, index))
        })?;

        tracing::debug!("{} -> {}", self.name, label);
        Ok(label.to_string())
    }
}

/// Both taxonomy dimensions over one shared encoder.
pub struct SupportClassifier {
    first: HeadClassifier,
    second: HeadClassifier,
}

impl SupportClassifier {
    pub fn new(first: HeadClassifier, second: HeadClassifier) -> Self {
        Self { first, second }
    }

    /// Load label sets and heads named in the `classifier` config section.
    pub fn from_config(config: &AppConfig, encoder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        let settings = &config.classifier;
        let csv = config.resolve_path(&settings.labels_csv);

        let first = HeadClassifier::new(
            settings.column_1.clone(),
            encoder.clone(),
            LinearHead::load(&config.resolve_path(&settings.head_1))?,
            LabelRegistry::from_csv(&csv, &settings.column_1)?,
        )?;
        let second = HeadClassifier::new(
            settings.column_2.clone(),
            encoder,
            LinearHead::load(&config.resolve_path(&settings.head_2))?,
            LabelRegistry::from_csv(&csv, &settings.column_2)?,
        )?;

        tracing::info!(
            "Classifier ready: {} x {} labels",
            first.labels().len(),
            second.labels().len()
        );

        Ok(Self::new(first, second))
    }

    pub async fn classify_1(&self, text: &str) -> AppResult<String> {
        self.first.classify(text).await
    }

    pub async fn classify_2(&self, text: &str) -> AppResult<String> {
        self.second.classify(text).await
    }

    pub async fn classify(&self, text: &str) -> AppResult<Classification> {
        Ok(Classification {
            class_1: self.classify_1(text).await?,
            class_2: self.classify_2(text).await?,
        })
    }
}

/// `question | topic | reference question | ...` built from a main index
/// lookup; the topic comes from the best hit.
pub fn enriched_text(
    question: &str,
    documents: &[RetrievedDocument],
    settings: &RetrievalSettings,
) -> AppResult<String> {
    let field = |doc: &RetrievedDocument, name: &str| -> AppResult<String> {
        doc.metadata
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::Schema {
                index: "main".to_string(),
                field: name.to_string(),
            })
    };

    let mut text = question.to_string();

    if let Some(best) = documents.first() {
        text.push_str(" | ");
        text.push_str(&field(best, &settings.topic_field)?);
    }

    for doc in documents {
        text.push_str(" | ");
        text.push_str(&field(doc, &settings.question_field)?);
    }

    Ok(text)
}
