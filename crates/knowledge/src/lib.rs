//! Knowledge retrieval and grounded answering for QnA Assist.
//!
//! Three read-only vector indexes (main knowledge base, user agreement,
//! placement conditions) are searched with one normalized query embedding;
//! the hits are reduced to a bounded context that grounds the generated
//! answer.

pub mod context;
pub mod embeddings;
pub mod index;
pub mod normalize;
pub mod rag;
pub mod retriever;

// Re-export commonly used types
pub use context::{assemble, Context, ContextCaps, ContextFields};
pub use embeddings::{create_provider, EmbeddingProvider, MockProvider, OllamaProvider};
pub use index::{cosine_similarity, FlatIndex, IndexedDocument, VectorIndex};
pub use normalize::normalize;
pub use rag::{AnswerGenerator, RagAnswer, RagPipeline};
pub use retriever::{IndexKind, MultiIndexRetriever, RetrievalSet, RetrievedDocument};
