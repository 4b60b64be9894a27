//! Decoding configuration and provider identifiers.

use qna_core::config::LlmSettings;
use qna_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model-specific decoding parameters.
///
/// Loaded once at startup, either from an HF-style `generation_config.json`
/// shipped with the model or from the `llm` config section, and attached to
/// every generation request unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,

    /// Fixed sampling seed; keeps decoding reproducible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// When `Some(false)` decoding is greedy regardless of temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
}

impl GenerationConfig {
    /// Build decoding parameters from the `llm` config section.
    ///
    /// When `generation_config` points to a file, that file wins and the
    /// inline defaults only fill the seed.
    pub fn from_settings(settings: &LlmSettings, base: &Path) -> AppResult<Self> {
        let inline = Self {
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            repetition_penalty: settings.repetition_penalty,
            seed: settings.seed,
            do_sample: None,
        };

        match settings.generation_config {
            Some(ref path) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base.join(path)
                };
                let mut loaded = Self::from_json_file(&path)?;
                if loaded.seed.is_none() {
                    loaded.seed = inline.seed;
                }
                Ok(loaded)
            }
            None => Ok(inline),
        }
    }

    /// Load an HF-style `generation_config.json`; unknown keys are ignored.
    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read generation config {:?}: {}",
                path, e
            ))
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!(
                "Failed to parse generation config {:?}: {}",
                path, e
            ))
        })?;

        tracing::debug!("Loaded generation config from {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Temperature actually sent to the backend.
    pub fn effective_temperature(&self) -> Option<f32> {
        match self.do_sample {
            Some(false) => Some(0.0),
            _ => self.temperature,
        }
    }
}

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
        }
    }
}
