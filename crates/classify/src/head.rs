//! Linear classification head over sentence embeddings.

use qna_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `logits = weights · embedding + bias`, one row per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearHead {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl LinearHead {
    pub fn new(weights: Vec<Vec<f32>>, bias: Vec<f32>) -> AppResult<Self> {
        if weights.is_empty() {
            return Err(AppError::Classification(
                "Classification head has no classes".to_string(),
            ));
        }

        if weights.len() != bias.len() {
            return Err(AppError::Classification(format!(
                "Classification head has {} weight rows but {} biases",
                weights.len(),
                bias.len()
            )));
        }

        let dims = weights[0].len();
        if dims == 0 || weights.iter().any(|row| row.len() != dims) {
            return Err(AppError::Classification(
                "Classification head weight rows differ in length".to_string(),
            ));
        }

        Ok(Self { weights, bias })
    }

    /// Load `{"weights": [[...]], "bias": [...]}` from a JSON file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Classification(format!("Failed to read head {:?}: {}", path, e))
        })?;

        let raw: LinearHead = serde_json::from_str(&contents).map_err(|e| {
            AppError::Classification(format!("Failed to parse head {:?}: {}", path, e))
        })?;

        let head = Self::new(raw.weights, raw.bias)?;
        tracing::debug!(
            "Loaded head {:?}: {} classes x {} dims",
            path,
            head.n_classes(),
            head.dims()
        );
        Ok(head)
    }

    pub fn n_classes(&self) -> usize {
        self.weights.len()
    }

    pub fn dims(&self) -> usize {
        self.weights[0].len()
    }

    pub fn logits(&self, embedding: &[f32]) -> AppResult<Vec<f32>> {
        if embedding.len() != self.dims() {
            return Err(AppError::Classification(format!(
                "Embedding has {} dimensions, head expects {}",
                embedding.len(),
                self.dims()
            )));
        }

        Ok(self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(embedding).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect())
    }

    /// Index of the highest logit.
    pub fn predict(&self, embedding: &[f32]) -> AppResult<usize> {
        let logits = self.logits(embedding)?;
        argmax(&logits)
            .ok_or_else(|| AppError::Classification("Head produced no logits".to_string()))
    }
}

/// Position of the maximum value; the first one wins on ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_logits() {
        let head = LinearHead::new(vec![vec![1.0, 0.0], vec![0.0, 2.0]], vec![0.5, 0.0]).unwrap();
        assert_eq!(head.logits(&[1.0, 1.0]).unwrap(), vec![1.5, 2.0]);
        assert_eq!(head.predict(&[1.0, 1.0]).unwrap(), 1);
        assert_eq!(head.predict(&[3.0, 1.0]).unwrap(), 0);
    }

    #[test]
    fn test_argmax_first_max_wins() {
        assert_eq!(argmax(&[0.1, 0.9, 0.9, 0.2]), Some(1));
        assert_eq!(argmax(&[-1.0, -1.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_shape_validation() {
        assert!(LinearHead::new(vec![], vec![]).is_err());
        assert!(LinearHead::new(vec![vec![1.0]], vec![0.0, 1.0]).is_err());
        assert!(LinearHead::new(vec![vec![1.0, 2.0], vec![1.0]], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_embedding_dimension_mismatch() {
        let head = LinearHead::new(vec![vec![1.0, 0.0]], vec![0.0]).unwrap();
        assert!(head.logits(&[1.0]).is_err());
    }

    #[test]
    fn test_load_from_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("class_1.json");
        std::fs::write(&path, r#"{"weights": [[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]], "bias": [0.0, 0.0, 0.1]}"#)
            .unwrap();

        let head = LinearHead::load(&path).unwrap();
        assert_eq!(head.n_classes(), 3);
        assert_eq!(head.dims(), 2);
    }
}
