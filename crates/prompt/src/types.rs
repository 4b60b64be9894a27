//! Prompt types for QnA Assist.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt definition loaded from YAML.
///
/// The system instruction is rendered from `system_template` with values
/// taken only from the definition itself (persona, refusal sentence, quality
/// rules). Per-query values flow exclusively into the user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Who the assistant speaks for
    pub persona: PromptPersona,

    /// The single sentence used to decline off-topic or provocative questions
    pub refusal: String,

    /// Answer-quality constraints, rendered as a numbered list
    #[serde(default)]
    pub rules: Vec<String>,

    /// System instruction template (Handlebars)
    #[serde(rename = "systemTemplate")]
    pub system_template: String,

    /// User turn template (Handlebars) with `question`, `main`,
    /// `conditions` and `user` variables
    pub template: String,
}

/// Persona settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPersona {
    /// Platform the support bot works for
    pub platform: String,
}

/// Retrieved snippets placed into the user turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    /// Canonical answers from the main knowledge base
    pub main: Vec<String>,

    /// Summaries from the placement conditions
    pub conditions: Vec<String>,

    /// Summaries from the user agreement
    pub user: Vec<String>,
}

/// A fully built prompt ready for chat formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System instruction
    pub system: String,

    /// User turn
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Number of snippets per context section (main, conditions, user)
    #[serde(rename = "contextSizes")]
    pub context_sizes: (usize, usize, usize),

    /// User turn variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: String,
        user: String,
        source_prompt_id: String,
        context: &PromptContext,
        resolved_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                context_sizes: (context.main.len(), context.conditions.len(), context.user.len()),
                resolved_variables,
            },
        }
    }
}
