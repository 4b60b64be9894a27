//! Voice message transcription.

use async_trait::async_trait;
use qna_core::config::TranscriptionSettings;
use qna_core::{AppError, AppResult};
use qna_moderation::MessageId;
use serde::Deserialize;
use std::path::Path;

/// Turns a recorded question into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> AppResult<String>;
}

/// File name a voice message is stored under.
pub fn voice_file_name(user: i64, message: MessageId) -> String {
    format!("voice_{}_{}.ogg", user, message)
}

#[derive(Debug, Deserialize)]
struct TranscriptionSegment {
    text: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    segments: Vec<TranscriptionSegment>,
}

/// Client for an OpenAI-compatible `/v1/audio/transcriptions` endpoint
/// serving a Whisper model.
pub struct WhisperHttpTranscriber {
    endpoint: String,
    model: String,
    language: String,
    client: reqwest::Client,
}

impl WhisperHttpTranscriber {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            language: language.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a transcriber from settings; `None` when no endpoint is set.
    pub fn from_settings(settings: &TranscriptionSettings) -> Option<Self> {
        settings
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, &settings.model, &settings.language))
    }
}

#[async_trait]
impl Transcriber for WhisperHttpTranscriber {
    async fn transcribe(&self, audio: &Path) -> AppResult<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "voice.ogg".to_string());

        tracing::debug!("Transcribing {:?} ({} bytes)", audio, bytes.len());

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "verbose_json");

        let url = format!("{}/v1/audio/transcriptions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Transcription(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Transcription(format!(
                "Transcription API error ({}): {}",
                status, error_text
            )));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Transcription(format!("Failed to parse response: {}", e)))?;

        let text = result
            .segments
            .into_iter()
            .next()
            .map(|segment| segment.text)
            .or(result.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AppError::Transcription("No speech recognized".to_string()))?;

        Ok(format!("{}?", text).trim().to_string())
    }
}
