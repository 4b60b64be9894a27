//! LLM integration crate for QnA Assist.
//!
//! Provides a provider-agnostic abstraction for the causal language model
//! that writes support answers, plus a single-flight worker that serializes
//! access to it.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime, raw prompt mode
//!
//! # Example
//! ```no_run
//! use qna_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "saiga-llama3:8b").with_max_tokens(4096);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;
pub mod worker;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
pub use types::{GenerationConfig, ProviderType};
pub use worker::GenerationWorker;
