//! Two-dimensional classification of support questions.
//!
//! Each dimension is a linear head over the shared sentence encoder; label
//! sets come from the columns of the training CSV.

pub mod classifier;
pub mod head;
pub mod labels;

pub use classifier::{enriched_text, Classification, Classifier, HeadClassifier, SupportClassifier};
pub use head::{argmax, LinearHead};
pub use labels::LabelRegistry;
