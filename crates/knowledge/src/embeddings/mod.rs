//! Text embedding providers.
//!
//! The same encoder embeds queries for retrieval and inputs for the
//! classification heads.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{MockProvider, OllamaProvider};
