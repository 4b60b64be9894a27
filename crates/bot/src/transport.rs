//! Chat platform abstraction.

use async_trait::async_trait;
use qna_core::AppResult;
use qna_moderation::{ChatId, Keyboard, MessageId};
use std::path::Path;

/// Something a chat user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message {
        chat: ChatId,
        /// Sender's user id
        user: i64,
        message: MessageId,
        content: Content,
    },
    /// An inline keyboard button was pressed
    Callback {
        chat: ChatId,
        callback_id: String,
        data: String,
    },
}

/// Payload of an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Voice { file_id: String },
    /// Stickers, photos and anything else the bot does not handle
    Unsupported,
}

/// Outgoing side of a chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message, returning the id the platform assigned to it.
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Keyboard,
    ) -> AppResult<MessageId>;

    /// Strip the inline buttons from a previously sent message.
    async fn remove_inline_keyboard(&self, chat: ChatId, message: MessageId) -> AppResult<()>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> AppResult<()>;

    /// Download a voice message to `dest`.
    async fn download_voice(&self, file_id: &str, dest: &Path) -> AppResult<()>;
}
