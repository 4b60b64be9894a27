//! Telegram Bot API transport.
//!
//! Bot API: https://core.telegram.org/bots/api
//!
//! Only the handful of methods the support bot needs are implemented:
//! `getUpdates` (long polling), `sendMessage`, `editMessageReplyMarkup`,
//! `answerCallbackQuery` and `getFile`.

use crate::transport::{ChatTransport, Content, Event};
use async_trait::async_trait;
use qna_core::{AppError, AppResult};
use qna_moderation::messages::{
    APPROVE_BUTTON, ASK_BUTTON, EDIT_BUTTON, LOGIN_BUTTON, THUMBS_DOWN, THUMBS_UP,
};
use qna_moderation::{ChatId, Decision, Keyboard, MessageId};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// Bot API envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    voice: Option<TgVoice>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgVoice {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct TgCallbackQuery {
    id: String,
    from: TgUser,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgFile {
    #[serde(default)]
    file_path: Option<String>,
}

/// One polled update. `event` is `None` for update kinds the bot ignores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub id: i64,
    pub event: Option<Event>,
}

impl From<TgUpdate> for Update {
    fn from(update: TgUpdate) -> Self {
        let event = if let Some(message) = update.message {
            let content = match (message.text, message.voice) {
                (Some(text), _) => Content::Text(text),
                (None, Some(voice)) => Content::Voice {
                    file_id: voice.file_id,
                },
                (None, None) => Content::Unsupported,
            };
            Some(Event::Message {
                chat: ChatId(message.chat.id),
                user: message.from.map(|u| u.id).unwrap_or(message.chat.id),
                message: MessageId(message.message_id),
                content,
            })
        } else {
            update.callback_query.map(|query| Event::Callback {
                chat: ChatId(
                    query
                        .message
                        .as_ref()
                        .map(|m| m.chat.id)
                        .unwrap_or(query.from.id),
                ),
                callback_id: query.id,
                data: query.data.unwrap_or_default(),
            })
        };

        Self {
            id: update.update_id,
            event,
        }
    }
}

/// Build the `reply_markup` object for a keyboard.
fn reply_markup(keyboard: Keyboard) -> Option<Value> {
    match keyboard {
        Keyboard::None => None,
        Keyboard::Main => Some(json!({
            "keyboard": [[{"text": LOGIN_BUTTON}], [{"text": ASK_BUTTON}]],
            "resize_keyboard": true
        })),
        Keyboard::Feedback => Some(json!({
            "keyboard": [[{"text": THUMBS_UP}, {"text": THUMBS_DOWN}]],
            "resize_keyboard": true
        })),
        Keyboard::Remove => Some(json!({"remove_keyboard": true})),
        Keyboard::Decision(id) => Some(json!({
            "inline_keyboard": [[
                {"text": EDIT_BUTTON, "callback_data": Decision::edit(id).callback_data()},
                {"text": APPROVE_BUTTON, "callback_data": Decision::approve(id).callback_data()}
            ]]
        })),
    }
}

/// Telegram client over plain HTTPS.
pub struct TelegramTransport {
    /// `{api_url}/bot{token}`
    method_base: String,

    /// `{api_url}/file/bot{token}`
    file_base: String,

    client: reqwest::Client,
}

impl TelegramTransport {
    /// Create a transport. Requests time out a little after the long-poll
    /// window so an idle `getUpdates` is never cut short.
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> AppResult<Self> {
        let api_url = api_url.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            method_base: format!("{}/bot{}", api_url, token),
            file_base: format!("{}/file/bot{}", api_url, token),
            client,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> AppResult<T> {
        let url = format!("{}/{}", self.method_base, method);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            AppError::Transport(format!("Failed to parse {} response ({}): {}", method, status, e))
        })?;

        if !envelope.ok {
            return Err(AppError::Transport(format!(
                "{} failed ({}): {}",
                method,
                status,
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string())
            )));
        }

        envelope
            .result
            .ok_or_else(|| AppError::Transport(format!("{} returned no result", method)))
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> AppResult<Vec<Update>> {
        let updates: Vec<TgUpdate> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": timeout_secs,
                    "allowed_updates": ["message", "callback_query"]
                }),
            )
            .await?;

        Ok(updates.into_iter().map(Update::from).collect())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Keyboard,
    ) -> AppResult<MessageId> {
        let mut body = json!({"chat_id": chat.0, "text": text});
        if let Some(markup) = reply_markup(keyboard) {
            body["reply_markup"] = markup;
        }

        let message: TgMessage = self.call("sendMessage", body).await?;
        tracing::debug!("Sent message {} to chat {}", message.message_id, chat);

        Ok(MessageId(message.message_id))
    }

    async fn remove_inline_keyboard(&self, chat: ChatId, message: MessageId) -> AppResult<()> {
        // Returns the edited message, or `true` for inline messages
        let _: Value = self
            .call(
                "editMessageReplyMarkup",
                json!({"chat_id": chat.0, "message_id": message.0}),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> AppResult<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                json!({"callback_query_id": callback_id}),
            )
            .await?;
        Ok(())
    }

    async fn download_voice(&self, file_id: &str, dest: &Path) -> AppResult<()> {
        let file: TgFile = self.call("getFile", json!({"file_id": file_id})).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| AppError::Transport(format!("File {} is not downloadable", file_id)))?;

        let url = format!("{}/{}", self.file_base, file_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Voice download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Transport(format!(
                "Voice download failed ({})",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Transport(format!("Voice download failed: {}", e)))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;

        tracing::debug!("Saved voice {} ({} bytes) to {:?}", file_id, bytes.len(), dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qna_moderation::ExchangeId;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123:abc";

    fn transport(server: &MockServer) -> TelegramTransport {
        TelegramTransport::new(&server.uri(), TOKEN, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_decision_keyboard_carries_exchange_id() {
        let id = ExchangeId::new();
        let markup = reply_markup(Keyboard::Decision(id)).unwrap();
        let buttons = &markup["inline_keyboard"][0];

        assert_eq!(buttons[0]["text"], EDIT_BUTTON);
        assert_eq!(buttons[0]["callback_data"], format!("edit:{}", id));
        assert_eq!(buttons[1]["text"], APPROVE_BUTTON);
        assert_eq!(buttons[1]["callback_data"], format!("approve:{}", id));
    }

    #[test]
    fn test_plain_message_has_no_markup() {
        assert!(reply_markup(Keyboard::None).is_none());
        assert_eq!(
            reply_markup(Keyboard::Remove).unwrap(),
            json!({"remove_keyboard": true})
        );
    }

    #[tokio::test]
    async fn test_send_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendMessage", TOKEN)))
            .and(body_partial_json(json!({
                "chat_id": 7,
                "text": "Привет",
                "reply_markup": {"keyboard": [[{"text": THUMBS_UP}, {"text": THUMBS_DOWN}]]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 42, "chat": {"id": 7}, "text": "Привет"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = transport(&server)
            .send_message(ChatId(7), "Привет", Keyboard::Feedback)
            .await
            .unwrap();
        assert_eq!(id, MessageId(42));
    }

    #[tokio::test]
    async fn test_api_error_is_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendMessage", TOKEN)))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let result = transport(&server)
            .send_message(ChatId(7), "x", Keyboard::None)
            .await;

        match result {
            Err(AppError::Transport(msg)) => assert!(msg.contains("chat not found")),
            other => panic!("Expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_updates_parses_events() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/bot{}/getUpdates", TOKEN)))
            .and(body_partial_json(json!({"offset": 10, "timeout": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 10,
                        "message": {
                            "message_id": 1,
                            "chat": {"id": 5},
                            "from": {"id": 6},
                            "text": "/start"
                        }
                    },
                    {
                        "update_id": 11,
                        "message": {
                            "message_id": 2,
                            "chat": {"id": 5},
                            "voice": {"file_id": "voice-file", "duration": 3}
                        }
                    },
                    {
                        "update_id": 12,
                        "callback_query": {
                            "id": "cb-1",
                            "from": {"id": 9},
                            "message": {"message_id": 3, "chat": {"id": 100}},
                            "data": "approve:x"
                        }
                    },
                    {"update_id": 13, "edited_message": {"message_id": 4, "chat": {"id": 5}}}
                ]
            })))
            .mount(&server)
            .await;

        let updates = transport(&server).get_updates(10, 1).await.unwrap();
        assert_eq!(updates.len(), 4);

        assert_eq!(
            updates[0].event,
            Some(Event::Message {
                chat: ChatId(5),
                user: 6,
                message: MessageId(1),
                content: Content::Text("/start".to_string()),
            })
        );
        assert_eq!(
            updates[1].event,
            Some(Event::Message {
                chat: ChatId(5),
                user: 5,
                message: MessageId(2),
                content: Content::Voice {
                    file_id: "voice-file".to_string()
                },
            })
        );
        assert_eq!(
            updates[2].event,
            Some(Event::Callback {
                chat: ChatId(100),
                callback_id: "cb-1".to_string(),
                data: "approve:x".to_string(),
            })
        );
        assert_eq!(updates[3].id, 13);
        assert_eq!(updates[3].event, None);
    }

    #[tokio::test]
    async fn test_download_voice() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("voices").join("voice_1_2.ogg");

        Mock::given(method("POST"))
            .and(path(format!("/bot{}/getFile", TOKEN)))
            .and(body_partial_json(json!({"file_id": "voice-file"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"file_id": "voice-file", "file_path": "voice/file_0.oga"}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/file/bot{}/voice/file_0.oga", TOKEN)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"OggS-audio".to_vec()))
            .mount(&server)
            .await;

        transport(&server)
            .download_voice("voice-file", &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"OggS-audio");
    }
}
