//! Identifiers and the actions the gate asks the chat front end to perform.

use qna_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Chat identifier as assigned by the messaging platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier, unique within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one question awaiting the moderator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExchangeId {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| AppError::Moderation(format!("Invalid exchange id '{}': {}", s, e)))
    }
}

/// Keyboard attached to an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave the current keyboard as is
    None,
    /// Reply keyboard with the operator login and "ask a question" buttons
    Main,
    /// Reply keyboard with 👍 and 👎
    Feedback,
    /// Remove the reply keyboard
    Remove,
    /// Inline edit/approve buttons for one exchange
    Decision(ExchangeId),
}

/// Side effect requested by the gate.
///
/// The gate never talks to the network itself; the front end performs
/// these in order after the state change has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send {
        chat: ChatId,
        text: String,
        keyboard: Keyboard,
    },
    RemoveInlineKeyboard {
        chat: ChatId,
        message: MessageId,
    },
    AnswerCallback {
        callback_id: String,
    },
}

impl Action {
    pub fn send(chat: ChatId, text: impl Into<String>) -> Self {
        Self::Send {
            chat,
            text: text.into(),
            keyboard: Keyboard::None,
        }
    }

    pub fn send_with(chat: ChatId, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Send {
            chat,
            text: text.into(),
            keyboard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_id_roundtrip_through_text() {
        let id = ExchangeId::new();
        let parsed: ExchangeId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_exchange_id_invalid() {
        assert!("not-a-uuid".parse::<ExchangeId>().is_err());
    }

    #[test]
    fn test_exchange_ids_unique() {
        assert_ne!(ExchangeId::new(), ExchangeId::new());
    }
}
