//! Error types for QnA Assist.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application, including configuration, I/O, LLM, retrieval, prompt,
//! classification, moderation and transport errors.

use thiserror::Error;

/// Unified error type for QnA Assist.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Library code never panics: errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider and generation errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base, embedding and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// A retrieved document lacks a metadata field the pipeline relies on.
    ///
    /// Signals that an index was built with a different schema.
    #[error("Schema mismatch: document in index '{index}' has no string field '{field}'")]
    Schema { index: String, field: String },

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Classification errors
    #[error("Classification error: {0}")]
    Classification(String),

    /// Moderation workflow errors
    #[error("Moderation error: {0}")]
    Moderation(String),

    /// Chat transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Audio transcription errors
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_message() {
        let err = AppError::Schema {
            index: "main".to_string(),
            field: "sum_text".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Schema mismatch: document in index 'main' has no string field 'sum_text'"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
