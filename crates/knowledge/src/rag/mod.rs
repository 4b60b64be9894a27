//! Retrieval-augmented answer generation.

pub mod generator;
pub mod pipeline;

pub use generator::AnswerGenerator;
pub use pipeline::{RagAnswer, RagPipeline};
