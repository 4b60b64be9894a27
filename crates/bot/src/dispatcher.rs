//! Routes chat events through the moderation gate.
//!
//! Updates are handled one at a time. Answer generation runs on a spawned
//! task so logins and moderator decisions keep flowing while the model is
//! busy.

use crate::transport::{ChatTransport, Content, Event};
use crate::voice::{voice_file_name, Transcriber};
use async_trait::async_trait;
use qna_core::AppResult;
use qna_knowledge::RagPipeline;
use qna_moderation::messages;
use qna_moderation::{
    Action, ChatId, Keyboard, MessageId, ModerationGate, Submission, SubmissionKind, TextOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Produces the draft answer a moderator reviews.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str) -> AppResult<String>;
}

#[async_trait]
impl Answerer for RagPipeline {
    async fn answer(&self, question: &str) -> AppResult<String> {
        Ok(RagPipeline::answer(self, question).await?.answer)
    }
}

/// Chat-bot front end.
#[derive(Clone)]
pub struct Dispatcher {
    gate: Arc<ModerationGate>,
    transport: Arc<dyn ChatTransport>,
    answerer: Arc<dyn Answerer>,
    transcriber: Option<Arc<dyn Transcriber>>,
    voice_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(
        gate: Arc<ModerationGate>,
        transport: Arc<dyn ChatTransport>,
        answerer: Arc<dyn Answerer>,
        voice_dir: PathBuf,
    ) -> Self {
        Self {
            gate,
            transport,
            answerer,
            transcriber: None,
            voice_dir,
        }
    }

    /// Accept voice questions, transcribed by `transcriber`.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Handle one event. Returns the generation task when a question was
    /// accepted for review.
    pub async fn handle(&self, event: Event) -> AppResult<Option<JoinHandle<()>>> {
        match event {
            Event::Callback {
                chat,
                callback_id,
                data,
            } => {
                tracing::debug!("Callback '{}' from chat {}", data, chat);
                let actions = self.gate.decide(chat, &callback_id, &data).await;
                self.perform(actions).await;
                Ok(None)
            }
            Event::Message {
                chat,
                user,
                message,
                content,
            } => match content {
                Content::Text(text) => self.handle_text(chat, text).await,
                Content::Voice { file_id } => {
                    self.handle_voice(chat, user, message, &file_id).await
                }
                Content::Unsupported => {
                    self.perform(vec![Action::send(chat, messages::UNKNOWN_COMMAND)])
                        .await;
                    Ok(None)
                }
            },
        }
    }

    async fn handle_text(&self, chat: ChatId, text: String) -> AppResult<Option<JoinHandle<()>>> {
        let actions = match text.trim() {
            "/start" => self.gate.start(chat).await,
            messages::LOGIN_BUTTON => self.gate.begin_login(chat).await,
            messages::ASK_BUTTON => self.gate.prompt_question(chat),
            _ => match self.gate.handle_text(chat, &text).await {
                TextOutcome::Reply(actions) => actions,
                TextOutcome::Question { question, ack } => {
                    self.perform(ack).await;
                    return Ok(Some(self.spawn_review(chat, question)));
                }
            },
        };

        self.perform(actions).await;
        Ok(None)
    }

    async fn handle_voice(
        &self,
        chat: ChatId,
        user: i64,
        message: MessageId,
        file_id: &str,
    ) -> AppResult<Option<JoinHandle<()>>> {
        let ack = match self.gate.submit(chat, SubmissionKind::Voice).await {
            Submission::Accepted(ack) => ack,
            Submission::Unavailable(actions) => {
                self.perform(actions).await;
                return Ok(None);
            }
        };

        let question = match self.transcribe(user, message, file_id).await {
            Ok(question) => question,
            Err(e) => {
                tracing::error!("Voice message from chat {} not transcribed: {}", chat, e);
                self.perform(vec![Action::send(chat, messages::TRANSCRIPTION_FAILED)])
                    .await;
                return Ok(None);
            }
        };

        tracing::info!("Voice question from chat {}: {}", chat, question);
        self.perform(ack).await;
        Ok(Some(self.spawn_review(chat, question)))
    }

    async fn transcribe(&self, user: i64, message: MessageId, file_id: &str) -> AppResult<String> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            qna_core::AppError::Transcription("No transcription service configured".to_string())
        })?;

        let dest = self.voice_dir.join(voice_file_name(user, message));
        self.transport.download_voice(file_id, &dest).await?;
        transcriber.transcribe(&dest).await
    }

    fn spawn_review(&self, requester: ChatId, question: String) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.review(requester, question).await })
    }

    /// Generate an answer and put it in front of the moderator.
    async fn review(&self, requester: ChatId, question: String) {
        let answer = match self.answerer.answer(&question).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Answer generation for chat {} failed: {}", requester, e);
                self.perform(vec![Action::send(requester, messages::GENERATION_FAILED)])
                    .await;
                return;
            }
        };

        let registered = match self
            .gate
            .register_exchange(requester, &question, &answer)
            .await
        {
            Ok(registered) => registered,
            Err(e) => {
                tracing::warn!("Answer for chat {} dropped: {}", requester, e);
                self.perform(vec![Action::send(requester, messages::OPERATOR_UNAVAILABLE)])
                    .await;
                return;
            }
        };

        let Action::Send {
            chat,
            text,
            keyboard,
        } = registered.review
        else {
            return;
        };

        match self.transport.send_message(chat, &text, keyboard).await {
            Ok(message) => {
                self.gate
                    .attach_moderator_message(registered.id, message)
                    .await
            }
            Err(e) => {
                tracing::error!("Review message for exchange {} not sent: {}", registered.id, e);
                self.gate.discard_exchange(registered.id).await;
                self.perform(vec![Action::send(requester, messages::GENERATION_FAILED)])
                    .await;
            }
        }
    }

    /// Execute actions in order. A failed action is logged and does not
    /// stop the rest. Messages carrying decision buttons are attached to
    /// their exchange.
    async fn perform(&self, actions: Vec<Action>) {
        for action in actions {
            let result = match &action {
                Action::Send {
                    chat,
                    text,
                    keyboard,
                } => match self.transport.send_message(*chat, text, *keyboard).await {
                    Ok(message) => {
                        if let Keyboard::Decision(id) = keyboard {
                            self.gate.attach_moderator_message(*id, message).await;
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                Action::RemoveInlineKeyboard { chat, message } => {
                    self.transport.remove_inline_keyboard(*chat, *message).await
                }
                Action::AnswerCallback { callback_id } => {
                    self.transport.answer_callback(callback_id).await
                }
            };

            if let Err(e) = result {
                tracing::error!("Failed to perform {:?}: {}", action, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qna_core::AppError;
    use qna_moderation::{Credentials, Decision, ExchangeId, Keyboard};
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records everything sent through it.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(ChatId, String, Keyboard)>>,
        removed: Mutex<Vec<(ChatId, MessageId)>>,
        answered: Mutex<Vec<String>>,
        next_id: Mutex<i64>,
    }

    impl RecordingTransport {
        fn texts_to(&self, chat: ChatId) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _, _)| *c == chat)
                .map(|(_, text, _)| text.clone())
                .collect()
        }

        /// Exchange id of the last review message sent to `moderator`.
        fn last_decision(&self, moderator: ChatId) -> ExchangeId {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find_map(|(c, _, keyboard)| match keyboard {
                    Keyboard::Decision(id) if *c == moderator => Some(*id),
                    _ => None,
                })
                .unwrap()
        }
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send_message(
            &self,
            chat: ChatId,
            text: &str,
            keyboard: Keyboard,
        ) -> AppResult<MessageId> {
            self.sent
                .lock()
                .unwrap()
                .push((chat, text.to_string(), keyboard));
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(MessageId(*next))
        }

        async fn remove_inline_keyboard(&self, chat: ChatId, message: MessageId) -> AppResult<()> {
            self.removed.lock().unwrap().push((chat, message));
            Ok(())
        }

        async fn answer_callback(&self, callback_id: &str) -> AppResult<()> {
            self.answered.lock().unwrap().push(callback_id.to_string());
            Ok(())
        }

        async fn download_voice(&self, _file_id: &str, dest: &Path) -> AppResult<()> {
            std::fs::write(dest, b"OggS")?;
            Ok(())
        }
    }

    /// Answers every question with a fixed prefix, or fails on request.
    struct EchoAnswerer;

    #[async_trait]
    impl Answerer for EchoAnswerer {
        async fn answer(&self, question: &str) -> AppResult<String> {
            if question.contains("fail") {
                return Err(AppError::Llm("model unavailable".to_string()));
            }
            Ok(format!("Ответ на: {}", question))
        }
    }

    struct FixedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, audio: &Path) -> AppResult<String> {
            assert!(audio.exists());
            Ok(self.0.to_string())
        }
    }

    const MODERATOR: ChatId = ChatId(100);
    const ALICE: ChatId = ChatId(1);
    const BOB: ChatId = ChatId(2);

    struct Harness {
        dispatcher: Dispatcher,
        transport: Arc<RecordingTransport>,
        _voices: TempDir,
    }

    fn harness() -> Harness {
        let voices = TempDir::new().unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let gate = Arc::new(ModerationGate::new(Credentials::new(
            "moderator",
            "password123",
        )));
        let dispatcher = Dispatcher::new(
            gate,
            transport.clone(),
            Arc::new(EchoAnswerer),
            voices.path().to_path_buf(),
        )
        .with_transcriber(Arc::new(FixedTranscriber("Как изменить пароль?")));

        Harness {
            dispatcher,
            transport,
            _voices: voices,
        }
    }

    fn text(chat: ChatId, text: &str) -> Event {
        Event::Message {
            chat,
            user: chat.0,
            message: MessageId(1),
            content: Content::Text(text.to_string()),
        }
    }

    fn callback(chat: ChatId, data: String) -> Event {
        Event::Callback {
            chat,
            callback_id: "cb".to_string(),
            data,
        }
    }

    impl Harness {
        async fn send(&self, event: Event) {
            if let Some(task) = self.dispatcher.handle(event).await.unwrap() {
                task.await.unwrap();
            }
        }

        async fn login(&self) {
            self.send(text(MODERATOR, messages::LOGIN_BUTTON)).await;
            self.send(text(MODERATOR, "moderator")).await;
            self.send(text(MODERATOR, "password123")).await;
        }
    }

    #[tokio::test]
    async fn test_start_shows_main_keyboard() {
        let h = harness();
        h.send(text(ALICE, "/start")).await;

        let sent = h.transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, messages::WELCOME);
        assert_eq!(sent[0].2, Keyboard::Main);
    }

    #[tokio::test]
    async fn test_question_without_moderator() {
        let h = harness();
        h.send(text(ALICE, "/start")).await;
        h.send(text(ALICE, "Как изменить пароль?")).await;

        assert_eq!(
            h.transport.texts_to(ALICE),
            vec![messages::WELCOME, messages::OPERATOR_UNAVAILABLE]
        );
    }

    #[tokio::test]
    async fn test_question_approved_end_to_end() {
        let h = harness();
        h.login().await;
        h.send(text(ALICE, "/start")).await;
        h.send(text(ALICE, "Как изменить пароль?")).await;

        let review = h.transport.texts_to(MODERATOR).pop().unwrap();
        assert!(review.contains("Как изменить пароль?"));
        assert_eq!(
            review,
            "Вопрос от пользователя: Как изменить пароль?\n\
             Сгенерированный ответ: Здравствуйте!\nОтвет на: Как изменить пароль?"
        );

        let id = h.transport.last_decision(MODERATOR);
        h.send(callback(MODERATOR, Decision::approve(id).callback_data()))
            .await;
        h.send(callback(MODERATOR, Decision::approve(id).callback_data()))
            .await;

        let delivered: Vec<String> = h
            .transport
            .texts_to(ALICE)
            .into_iter()
            .filter(|t| t.starts_with("Ответ от оператора"))
            .collect();
        assert_eq!(
            delivered,
            vec!["Ответ от оператора: Здравствуйте!\nОтвет на: Как изменить пароль?"]
        );
        assert_eq!(h.transport.removed.lock().unwrap().len(), 1);
        assert_eq!(h.transport.answered.lock().unwrap().len(), 2);
        assert!(h
            .transport
            .texts_to(MODERATOR)
            .contains(&messages::ALREADY_HANDLED.to_string()));
    }

    #[tokio::test]
    async fn test_edited_answer_delivered() {
        let h = harness();
        h.login().await;
        h.send(text(ALICE, "/start")).await;
        h.send(text(ALICE, "Как изменить пароль?")).await;

        let id = h.transport.last_decision(MODERATOR);
        h.send(callback(MODERATOR, Decision::edit(id).callback_data()))
            .await;
        h.send(text(MODERATOR, "Custom answer")).await;

        assert_eq!(
            h.transport.texts_to(ALICE).last().unwrap(),
            "Ответ от оператора: Custom answer"
        );
        assert_eq!(
            h.transport.texts_to(MODERATOR).last().unwrap(),
            messages::EDITED_ANSWER_DELIVERED
        );
    }

    #[tokio::test]
    async fn test_two_requesters_keep_their_answers() {
        let h = harness();
        h.login().await;
        h.send(text(ALICE, "/start")).await;
        h.send(text(BOB, "/start")).await;

        h.send(text(ALICE, "Вопрос A")).await;
        let a = h.transport.last_decision(MODERATOR);
        h.send(text(BOB, "Вопрос B")).await;

        h.send(callback(MODERATOR, Decision::approve(a).callback_data()))
            .await;

        assert_eq!(
            h.transport.texts_to(ALICE).last().unwrap(),
            "Ответ от оператора: Здравствуйте!\nОтвет на: Вопрос A"
        );
        assert!(!h
            .transport
            .texts_to(BOB)
            .iter()
            .any(|t| t.starts_with("Ответ от оператора")));
    }

    #[tokio::test]
    async fn test_reoffered_exchange_can_still_be_approved() {
        let h = harness();
        h.login().await;
        h.send(text(ALICE, "/start")).await;
        h.send(text(BOB, "/start")).await;

        h.send(text(ALICE, "Вопрос A")).await;
        let a = h.transport.last_decision(MODERATOR);
        h.send(text(BOB, "Вопрос B")).await;
        let b = h.transport.last_decision(MODERATOR);

        h.send(callback(MODERATOR, Decision::edit(a).callback_data()))
            .await;
        h.send(callback(MODERATOR, Decision::edit(b).callback_data()))
            .await;
        assert_eq!(h.transport.last_decision(MODERATOR), a);

        // Message ids count sends from 1
        let reoffered = {
            let sent = h.transport.sent.lock().unwrap();
            let position = sent
                .iter()
                .rposition(|(_, _, keyboard)| *keyboard == Keyboard::Decision(a))
                .unwrap();
            MessageId(position as i64 + 1)
        };

        h.send(text(MODERATOR, "Custom")).await;
        h.send(callback(MODERATOR, Decision::approve(a).callback_data()))
            .await;

        assert_eq!(
            h.transport.texts_to(BOB).last().unwrap(),
            "Ответ от оператора: Custom"
        );
        assert_eq!(
            h.transport.texts_to(ALICE).last().unwrap(),
            "Ответ от оператора: Здравствуйте!\nОтвет на: Вопрос A"
        );
        assert_eq!(
            h.transport.removed.lock().unwrap().last(),
            Some(&(MODERATOR, reoffered))
        );
    }

    #[tokio::test]
    async fn test_generation_failure_notifies_requester() {
        let h = harness();
        h.login().await;
        h.send(text(ALICE, "/start")).await;
        h.send(text(ALICE, "please fail")).await;

        assert_eq!(
            h.transport.texts_to(ALICE).last().unwrap(),
            messages::GENERATION_FAILED
        );
    }

    #[tokio::test]
    async fn test_voice_question_needs_no_start() {
        let h = harness();
        h.login().await;

        // Typed text from a chat that never sent /start is not a question
        h.send(text(ALICE, "Как изменить пароль?")).await;
        assert_eq!(h.transport.texts_to(ALICE), vec![messages::UNKNOWN_COMMAND]);

        h.send(Event::Message {
            chat: ALICE,
            user: 1,
            message: MessageId(9),
            content: Content::Voice {
                file_id: "file".to_string(),
            },
        })
        .await;

        assert_eq!(
            h.transport.texts_to(ALICE),
            vec![messages::UNKNOWN_COMMAND, messages::VOICE_QUESTION_SENT]
        );
        assert!(h
            .transport
            .texts_to(MODERATOR)
            .last()
            .unwrap()
            .starts_with("Вопрос от пользователя: Как изменить пароль?"));
    }

    #[tokio::test]
    async fn test_ask_button_and_feedback() {
        let h = harness();
        h.send(text(ALICE, messages::ASK_BUTTON)).await;
        h.send(text(ALICE, messages::THUMBS_UP)).await;

        assert_eq!(h.transport.texts_to(ALICE), vec![messages::ENTER_QUESTION]);
    }
}
