//! Bounded generation context built from retrieved documents.

use crate::retriever::{IndexKind, RetrievedDocument};
use qna_core::config::RetrievalSettings;
use qna_core::{AppError, AppResult};
use qna_prompt::PromptContext;
use serde::{Deserialize, Serialize};

/// How many snippets each index contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextCaps {
    pub main: usize,
    pub user: usize,
    pub conditions: usize,
}

impl Default for ContextCaps {
    fn default() -> Self {
        Self {
            main: 3,
            user: 1,
            conditions: 1,
        }
    }
}

impl ContextCaps {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            main: settings.main_k,
            user: settings.user_k,
            conditions: settings.conditions_k,
        }
    }
}

/// Metadata fields read from each index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFields {
    /// Canonical answer column of the main knowledge base
    pub answer: String,
    /// Summary column of the user agreement and conditions indexes
    pub summary: String,
}

impl Default for ContextFields {
    fn default() -> Self {
        Self {
            answer: "Ответ из БЗ".to_string(),
            summary: "sum_text".to_string(),
        }
    }
}

impl ContextFields {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            answer: settings.answer_field.clone(),
            summary: settings.summary_field.clone(),
        }
    }

    fn for_kind(&self, kind: IndexKind) -> &str {
        match kind {
            IndexKind::Main => &self.answer,
            IndexKind::User | IndexKind::Conditions => &self.summary,
        }
    }
}

/// Snippets handed to the answer generator, most similar first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub main: Vec<String>,
    pub user: Vec<String>,
    pub conditions: Vec<String>,
}

impl From<Context> for PromptContext {
    fn from(context: Context) -> Self {
        Self {
            main: context.main,
            conditions: context.conditions,
            user: context.user,
        }
    }
}

/// Extract one field per document, keeping order and truncating to `caps`.
///
/// A document without the expected string field fails the whole assembly.
pub fn assemble(
    main: &[RetrievedDocument],
    user: &[RetrievedDocument],
    conditions: &[RetrievedDocument],
    caps: ContextCaps,
    fields: &ContextFields,
) -> AppResult<Context> {
    Ok(Context {
        main: extract(IndexKind::Main, main, caps.main, fields)?,
        user: extract(IndexKind::User, user, caps.user, fields)?,
        conditions: extract(IndexKind::Conditions, conditions, caps.conditions, fields)?,
    })
}

fn extract(
    kind: IndexKind,
    documents: &[RetrievedDocument],
    cap: usize,
    fields: &ContextFields,
) -> AppResult<Vec<String>> {
    let field = fields.for_kind(kind);

    documents
        .iter()
        .take(cap)
        .map(|doc| {
            doc.metadata
                .get(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| AppError::Schema {
                    index: kind.to_string(),
                    field: field.to_string(),
                })
        })
        .collect()
}
