//! Prompt system for QnA Assist.
//!
//! This crate provides:
//! - YAML-based prompt definitions with a built-in support prompt
//! - Handlebars rendering with a fixed system instruction
//! - Retrieved context injection into the user turn
//! - Chat formatting and reply extraction for raw-mode generation

pub mod builder;
pub mod chat;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, render_list, render_system};
pub use chat::ChatTemplate;
pub use loader::{default_definition, load_prompt, DEFAULT_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptContext, PromptDefinition, PromptPersona};
