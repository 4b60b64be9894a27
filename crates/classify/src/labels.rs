//! Label sets read from the training CSV.

use qna_core::{AppError, AppResult};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Immutable bidirectional mapping between labels and dense indices.
///
/// Indices follow the order in which labels first appear in the column,
/// which is the order the classification heads were trained with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRegistry {
    labels: Vec<String>,
    indices: HashMap<String, usize>,
}

impl LabelRegistry {
    /// Build a registry from distinct labels in first-appearance order.
    pub fn from_labels<I, S>(labels: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut indices = HashMap::new();

        for label in labels {
            let label = label.into();
            if indices.contains_key(&label) {
                continue;
            }
            // A blank cell is a class of its own; skipping it would shift
            // every later index away from the trained head
            if label.is_empty() {
                tracing::warn!("Blank label kept at index {}", ordered.len());
            }
            indices.insert(label.clone(), ordered.len());
            ordered.push(label);
        }

        if ordered.is_empty() {
            return Err(AppError::Config("Label set is empty".to_string()));
        }

        Ok(Self {
            labels: ordered,
            indices,
        })
    }

    /// Read the distinct values of `column` from a CSV file.
    pub fn from_csv(path: &Path, column: &str) -> AppResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open labels CSV {:?}: {}", path, e))
        })?;

        let registry = Self::from_reader(file, column)?;
        tracing::info!(
            "Loaded {} labels for '{}' from {:?}",
            registry.len(),
            column,
            path
        );
        Ok(registry)
    }

    /// Read the distinct values of `column` from CSV data with a header row.
    pub fn from_reader<R: Read>(reader: R, column: &str) -> AppResult<Self> {
        let mut csv = csv::Reader::from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| AppError::Config(format!("Failed to read CSV header: {}", e)))?;
        let position = headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| AppError::Config(format!("CSV has no column '{}'", column)))?;

        let mut values = Vec::new();
        for record in csv.records() {
            let record =
                record.map_err(|e| AppError::Config(format!("Failed to read CSV row: {}", e)))?;
            values.push(record.get(position).unwrap_or_default().to_string());
        }

        Self::from_labels(values)
            .map_err(|_| AppError::Config(format!("CSV column '{}' has no labels", column)))
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.indices.get(label).copied()
    }

    pub fn label_of(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}
