//! Vector index abstraction and the flat in-memory backend.
//!
//! Indexes are built offline; at runtime they are read-only.

use qna_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A document stored in a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,

    /// Text that was embedded when the index was built
    pub page_content: String,

    /// Source columns of the knowledge base row (answer, summary, topic...)
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,

    pub embedding: Vec<f32>,
}

/// Trait for vector index backends.
pub trait VectorIndex: Send + Sync {
    /// Search for the top-k most similar documents to the query embedding.
    ///
    /// Returns at most `top_k` documents ordered by descending similarity.
    fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<(IndexedDocument, f32)>>;

    /// Number of documents in the index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// On-disk layout of a [`FlatIndex`].
#[derive(Debug, Serialize, Deserialize)]
struct FlatIndexFile {
    dimensions: usize,
    documents: Vec<IndexedDocument>,
}

/// Brute-force cosine similarity index held in memory.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    name: String,
    dimensions: usize,
    documents: Vec<IndexedDocument>,
}

impl FlatIndex {
    /// Build an index from documents, checking every embedding's length.
    pub fn new(
        name: impl Into<String>,
        dimensions: usize,
        documents: Vec<IndexedDocument>,
    ) -> AppResult<Self> {
        let name = name.into();

        if let Some(doc) = documents.iter().find(|d| d.embedding.len() != dimensions) {
            return Err(AppError::Knowledge(format!(
                "Index '{}': document '{}' has {} dimensions, expected {}",
                name,
                doc.id,
                doc.embedding.len(),
                dimensions
            )));
        }

        Ok(Self {
            name,
            dimensions,
            documents,
        })
    }

    /// Load an index from its JSON file.
    pub fn load(name: impl Into<String>, path: &Path) -> AppResult<Self> {
        let name = name.into();

        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Knowledge(format!(
                "Failed to read index '{}' at {:?}: {}",
                name, path, e
            ))
        })?;

        let file: FlatIndexFile = serde_json::from_str(&contents).map_err(|e| {
            AppError::Knowledge(format!(
                "Failed to parse index '{}' at {:?}: {}",
                name, path, e
            ))
        })?;

        let index = Self::new(name, file.dimensions, file.documents)?;

        tracing::info!(
            "Loaded index '{}' from {:?}: {} documents, {} dimensions",
            index.name,
            path,
            index.documents.len(),
            index.dimensions
        );

        Ok(index)
    }

    /// Write the index to a JSON file.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = FlatIndexFile {
            dimensions: self.dimensions,
            documents: self.documents.clone(),
        };
        std::fs::write(path, serde_json::to_string(&file)?)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl VectorIndex for FlatIndex {
    fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<(IndexedDocument, f32)>> {
        if query_embedding.len() != self.dimensions {
            return Err(AppError::Knowledge(format!(
                "Index '{}': query has {} dimensions, expected {}",
                self.name,
                query_embedding.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (i, cosine_similarity(query_embedding, &doc.embedding)))
            .collect();

        // Stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| (self.documents[i].clone(), score))
            .collect())
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(id: &str, embedding: Vec<f32>) -> IndexedDocument {
        IndexedDocument {
            id: id.to_string(),
            page_content: format!("content {}", id),
            metadata: BTreeMap::new(),
            embedding,
        }
    }

    fn sample_index() -> FlatIndex {
        FlatIndex::new(
            "main",
            2,
            vec![
                doc("a", vec![1.0, 0.0]),
                doc("b", vec![0.0, 1.0]),
                doc("c", vec![0.7, 0.7]),
                doc("d", vec![-1.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let index = sample_index();
        let results = index.search(&[1.0, 0.1], 3).unwrap();

        let ids: Vec<&str> = results.iter().map(|(d, _)| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_search_at_most_k() {
        let index = sample_index();
        for k in 0..6 {
            let results = index.search(&[0.3, 0.9], k).unwrap();
            assert_eq!(results.len(), k.min(index.len()));
        }
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = FlatIndex::new(
            "user",
            2,
            vec![
                doc("first", vec![1.0, 0.0]),
                doc("second", vec![2.0, 0.0]),
                doc("third", vec![0.5, 0.0]),
            ],
        )
        .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|(d, _)| d.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = sample_index();
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_document_dimension_mismatch() {
        let result = FlatIndex::new("main", 3, vec![doc("a", vec![1.0, 0.0])]);
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("indexes/main.json");

        let mut with_meta = doc("a", vec![1.0, 0.0]);
        with_meta.metadata.insert(
            "Ответ из БЗ".to_string(),
            serde_json::Value::String("Ответ".to_string()),
        );
        FlatIndex::new("main", 2, vec![with_meta.clone()])
            .unwrap()
            .save(&path)
            .unwrap();

        let loaded = FlatIndex::load("main", &path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.dimensions(), 2);
        assert_eq!(loaded.search(&[1.0, 0.0], 1).unwrap()[0].0, with_meta);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = FlatIndex::load("main", &temp.path().join("missing.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
