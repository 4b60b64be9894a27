//! Ollama LLM provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md
//!
//! Requests marked `raw` bypass Ollama's own prompt template, so a prompt that
//! was already chat-formatted reaches the model byte for byte.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use qna_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    raw: bool,
    stream: bool,
    options: OllamaOptions,
}

/// Ollama model options.
#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose HTTP requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaRequest {
        let decoding = &request.decoding;

        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: if request.raw {
                None
            } else {
                request.system.clone()
            },
            raw: request.raw,
            stream: false,
            options: OllamaOptions {
                num_predict: request.max_tokens,
                temperature: decoding.effective_temperature(),
                top_p: decoding.top_p,
                top_k: decoding.top_k,
                repeat_penalty: decoding.repetition_penalty,
                seed: decoding.seed,
            },
        }
    }

    /// Convert Ollama response to LlmResponse.
    fn convert_response(&self, response: OllamaResponse) -> LlmResponse {
        let usage = LlmUsage::new(
            response.prompt_eval_count.unwrap_or(0),
            response.eval_count.unwrap_or(0),
        );

        LlmResponse {
            content: response.response,
            model: response.model,
            usage,
            done: response.done,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(raw = request.raw, "Sending completion request to Ollama");
        tracing::debug!("Prompt length: {} bytes", request.prompt.len());

        let ollama_request = self.to_ollama_request(request);
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::info!(
            prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0),
            completion_tokens = ollama_response.eval_count.unwrap_or(0),
            "Received completion from Ollama"
        );

        Ok(self.convert_response(ollama_response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerationConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::with_base_url("http://localhost:11434/");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("Hello", "saiga")
            .with_system("ignored in raw mode")
            .with_raw()
            .with_max_tokens(4096)
            .with_decoding(GenerationConfig {
                temperature: Some(0.2),
                top_k: Some(30),
                seed: Some(69),
                ..Default::default()
            });

        let ollama_req = client.to_ollama_request(&request);
        assert_eq!(ollama_req.model, "saiga");
        assert_eq!(ollama_req.prompt, "Hello");
        assert!(ollama_req.raw);
        assert!(!ollama_req.stream);
        assert!(ollama_req.system.is_none());
        assert_eq!(ollama_req.options.num_predict, Some(4096));
        assert_eq!(ollama_req.options.temperature, Some(0.2));
        assert_eq!(ollama_req.options.top_k, Some(30));
        assert_eq!(ollama_req.options.seed, Some(69));
    }

    #[tokio::test]
    async fn test_complete_sends_raw_prompt() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "saiga",
                "raw": true,
                "stream": false,
                "options": { "num_predict": 4096 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "saiga",
                "response": "  Ответ  ",
                "done": true,
                "prompt_eval_count": 10,
                "eval_count": 3
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        let request = LlmRequest::new("<prompt>", "saiga")
            .with_raw()
            .with_max_tokens(4096);

        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.content, "  Ответ  ");
        assert_eq!(response.usage.total_tokens, 13);
        assert!(response.done);
    }

    #[tokio::test]
    async fn test_complete_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("out of memory"))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        let err = client
            .complete(&LlmRequest::new("q", "saiga"))
            .await
            .unwrap_err();

        match err {
            AppError::Llm(msg) => assert!(msg.contains("out of memory")),
            other => panic!("Expected LLM error, got {:?}", other),
        }
    }
}
