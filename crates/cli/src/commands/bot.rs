//! Bot command handler.

use crate::services;
use clap::Args;
use qna_bot::{run_polling, Dispatcher, TelegramTransport, WhisperHttpTranscriber};
use qna_core::{config::AppConfig, AppResult};
use qna_moderation::{Credentials, ModerationGate};
use std::sync::Arc;
use std::time::Duration;

/// Run the moderated Telegram support bot
#[derive(Args, Debug)]
pub struct BotCommand {
    /// Long-polling timeout in seconds (overrides bot.pollTimeoutSecs)
    #[arg(long)]
    pub poll_timeout: Option<u64>,
}

impl BotCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing bot command");

        let token = config.bot_token()?;
        let (login, password) = config.moderator_credentials();
        let poll_timeout = self.poll_timeout.unwrap_or(config.bot.poll_timeout_secs);

        let (_encoder, retriever) = services::retriever(config)?;
        let pipeline = Arc::new(services::pipeline(config, retriever)?);

        let voice_dir = config.resolve_path(&config.bot.voice_dir);
        tokio::fs::create_dir_all(&voice_dir).await?;

        let transport = Arc::new(TelegramTransport::new(
            &config.bot.api_url,
            &token,
            Duration::from_secs(poll_timeout),
        )?);
        let gate = Arc::new(ModerationGate::new(Credentials::new(login, password)));

        let mut dispatcher = Dispatcher::new(gate, transport.clone(), pipeline, voice_dir);
        match WhisperHttpTranscriber::from_settings(&config.transcription) {
            Some(transcriber) => dispatcher = dispatcher.with_transcriber(Arc::new(transcriber)),
            None => tracing::warn!("transcription.endpoint not set; voice questions are rejected"),
        }

        run_polling(transport, dispatcher, poll_timeout).await
    }
}
