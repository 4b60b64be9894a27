//! LLM provider factory.
//!
//! Creates the generation client described by the `llm` config section.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use crate::types::ProviderType;
use qna_core::config::LlmSettings;
use qna_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the configured provider.
///
/// # Errors
/// Returns an error if the provider is unknown or the HTTP client cannot be
/// built.
pub fn create_client(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    let provider = ProviderType::parse(&settings.provider).ok_or_else(|| {
        AppError::Config(format!("Unknown LLM provider: {}", settings.provider))
    })?;

    match provider {
        ProviderType::Ollama => {
            let client = match settings.timeout_secs {
                Some(secs) => {
                    OllamaClient::with_timeout(&settings.endpoint, Duration::from_secs(secs))?
                }
                None => OllamaClient::with_base_url(&settings.endpoint),
            };
            tracing::debug!("Created Ollama client for {}", settings.endpoint);
            Ok(Arc::new(client))
        }
    }
}
