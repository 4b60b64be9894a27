//! The moderation gate state machine.
//!
//! All state sits behind one async mutex. Every method takes the lock,
//! applies a state change and returns the actions to perform; the lock is
//! never held while the caller talks to the network or waits for
//! generation.

use crate::exchange::{Decision, DecisionKind, ExchangeState, ExchangeStore, PendingExchange};
use crate::messages;
use crate::session::{ChatState, Credentials};
use crate::types::{Action, ChatId, ExchangeId, Keyboard, MessageId};
use qna_core::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct GateState {
    moderator: Option<ChatId>,
    chats: HashMap<ChatId, ChatState>,
    requesters: HashSet<ChatId>,
    exchanges: ExchangeStore,
}

impl GateState {
    fn chat_state(&self, chat: ChatId) -> ChatState {
        self.chats.get(&chat).copied().unwrap_or_default()
    }

    fn set_chat_state(&mut self, chat: ChatId, state: ChatState) {
        if state == ChatState::Idle {
            self.chats.remove(&chat);
        } else {
            self.chats.insert(chat, state);
        }
    }

    /// Put an exchange whose edit was abandoned back in front of the
    /// moderator with fresh decision buttons.
    fn reoffer(&mut self, id: ExchangeId) -> Option<Action> {
        let exchange = self.exchanges.get_mut(&id)?;
        if exchange.state != ExchangeState::AwaitingModeratorEdit {
            return None;
        }

        exchange.state = ExchangeState::AwaitingModeratorDecision;
        // The old message lost its buttons when the edit began
        exchange.moderator_message = None;
        tracing::info!("Exchange {} is awaiting a decision again", id);

        Some(Action::send_with(
            exchange.moderator,
            messages::moderator_review(&exchange.question, &exchange.answer),
            Keyboard::Decision(id),
        ))
    }
}

/// How a question reached the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Text,
    Voice,
}

/// Result of offering a question to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A moderator is active; generate an answer, then call
    /// [`ModerationGate::register_exchange`]
    Accepted(Vec<Action>),
    /// Nobody can review answers right now; the question is dropped
    Unavailable(Vec<Action>),
}

/// What to do with an incoming free-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    Reply(Vec<Action>),
    /// The text is a question that must be answered and reviewed
    Question { question: String, ack: Vec<Action> },
}

/// A stored exchange and the message that puts it in front of the
/// moderator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredExchange {
    pub id: ExchangeId,
    pub moderator: ChatId,
    pub review: Action,
}

/// Moderator authentication and per-question approval.
#[derive(Debug)]
pub struct ModerationGate {
    credentials: Credentials,
    state: Mutex<GateState>,
}

impl ModerationGate {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            state: Mutex::new(GateState::default()),
        }
    }

    /// `/start`: greet, register the chat as a requester and abandon any
    /// half-finished login.
    pub async fn start(&self, chat: ChatId) -> Vec<Action> {
        let mut state = self.state.lock().await;
        state.requesters.insert(chat);
        if matches!(
            state.chat_state(chat),
            ChatState::AwaitingLogin | ChatState::AwaitingPassword
        ) {
            state.set_chat_state(chat, ChatState::Idle);
        }

        vec![Action::send_with(chat, messages::WELCOME, Keyboard::Main)]
    }

    /// Login button pressed. An edit in progress is abandoned and its
    /// exchange offered for a decision again.
    pub async fn begin_login(&self, chat: ChatId) -> Vec<Action> {
        let mut state = self.state.lock().await;

        let mut actions = Vec::new();
        if let ChatState::EditingExchange(id) = state.chat_state(chat) {
            actions.extend(state.reoffer(id));
        }
        state.set_chat_state(chat, ChatState::AwaitingLogin);

        actions.push(Action::send(chat, messages::ENTER_LOGIN));
        actions
    }

    /// "Ask a question" button pressed.
    pub fn prompt_question(&self, chat: ChatId) -> Vec<Action> {
        vec![Action::send(chat, messages::ENTER_QUESTION)]
    }

    /// The active moderator, if anyone has logged in.
    pub async fn moderator(&self) -> Option<ChatId> {
        self.state.lock().await.moderator
    }

    /// Number of exchanges waiting for the moderator.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.exchanges.len()
    }

    pub async fn exchange(&self, id: &ExchangeId) -> Option<PendingExchange> {
        self.state.lock().await.exchanges.get(id).cloned()
    }

    /// Route a free-text message by the sender's conversation state.
    pub async fn handle_text(&self, chat: ChatId, text: &str) -> TextOutcome {
        let mut state = self.state.lock().await;

        match state.chat_state(chat) {
            ChatState::AwaitingLogin => {
                return TextOutcome::Reply(if self.credentials.login_matches(text) {
                    state.set_chat_state(chat, ChatState::AwaitingPassword);
                    vec![Action::send(chat, messages::ENTER_PASSWORD)]
                } else {
                    vec![Action::send(chat, messages::WRONG_LOGIN)]
                });
            }
            ChatState::AwaitingPassword => {
                state.set_chat_state(chat, ChatState::Idle);
                return TextOutcome::Reply(if self.credentials.password_matches(text) {
                    if let Some(previous) = state.moderator.replace(chat) {
                        if previous != chat {
                            tracing::info!("Moderator {} replaced by {}", previous, chat);
                        }
                    }
                    tracing::info!("Moderator logged in from chat {}", chat);
                    vec![Action::send_with(
                        chat,
                        messages::LOGIN_SUCCESS,
                        Keyboard::Remove,
                    )]
                } else {
                    tracing::warn!("Failed moderator login from chat {}", chat);
                    vec![Action::send(chat, messages::WRONG_PASSWORD)]
                });
            }
            ChatState::EditingExchange(id) => {
                state.set_chat_state(chat, ChatState::Idle);
                return TextOutcome::Reply(Self::deliver_edit(&mut state, chat, id, text));
            }
            ChatState::Idle => {}
        }

        if messages::is_feedback(text) {
            return TextOutcome::Reply(Vec::new());
        }

        if !state.requesters.contains(&chat) {
            return TextOutcome::Reply(vec![Action::send(chat, messages::UNKNOWN_COMMAND)]);
        }

        match Self::submission(&state, chat, SubmissionKind::Text) {
            Submission::Accepted(ack) => TextOutcome::Question {
                question: text.to_string(),
                ack,
            },
            Submission::Unavailable(actions) => TextOutcome::Reply(actions),
        }
    }

    /// Offer a question (already transcribed or typed) for review.
    pub async fn submit(&self, chat: ChatId, kind: SubmissionKind) -> Submission {
        let state = self.state.lock().await;
        Self::submission(&state, chat, kind)
    }

    fn submission(state: &GateState, chat: ChatId, kind: SubmissionKind) -> Submission {
        if state.moderator.is_none() {
            return Submission::Unavailable(vec![Action::send(
                chat,
                messages::OPERATOR_UNAVAILABLE,
            )]);
        }

        let ack = match kind {
            SubmissionKind::Text => messages::QUESTION_SENT,
            SubmissionKind::Voice => messages::VOICE_QUESTION_SENT,
        };
        Submission::Accepted(vec![Action::send(chat, ack)])
    }

    /// Store a generated answer and build the review message for the
    /// current moderator.
    pub async fn register_exchange(
        &self,
        requester: ChatId,
        question: &str,
        answer: &str,
    ) -> AppResult<RegisteredExchange> {
        let mut state = self.state.lock().await;

        let moderator = state
            .moderator
            .ok_or_else(|| AppError::Moderation("No moderator is logged in".to_string()))?;

        let answer = format!("{}{}", messages::ANSWER_GREETING, answer);
        let review = messages::moderator_review(question, &answer);
        let id = state.exchanges.insert(PendingExchange::new(
            requester,
            moderator,
            question.to_string(),
            answer,
        ));

        tracing::info!(
            "Exchange {} from chat {} awaits moderator {} ({} pending)",
            id,
            requester,
            moderator,
            state.exchanges.len()
        );

        Ok(RegisteredExchange {
            id,
            moderator,
            review: Action::send_with(moderator, review, Keyboard::Decision(id)),
        })
    }

    /// Remember which message carries the exchange's decision buttons.
    pub async fn attach_moderator_message(&self, id: ExchangeId, message: MessageId) {
        let mut state = self.state.lock().await;
        if let Some(exchange) = state.exchanges.get_mut(&id) {
            exchange.moderator_message = Some(message);
        }
    }

    /// Drop an exchange whose review message could not be delivered.
    pub async fn discard_exchange(&self, id: ExchangeId) -> Option<PendingExchange> {
        self.state.lock().await.exchanges.remove(&id)
    }

    /// Apply an inline button press.
    pub async fn decide(&self, chat: ChatId, callback_id: &str, data: &str) -> Vec<Action> {
        let answered = Action::AnswerCallback {
            callback_id: callback_id.to_string(),
        };

        let decision = match Decision::parse(data) {
            Some(decision) => decision,
            None => {
                tracing::warn!("Ignoring malformed callback data: {}", data);
                return vec![answered];
            }
        };

        let mut state = self.state.lock().await;

        let awaiting_decision = state
            .exchanges
            .get(&decision.exchange)
            .map(|e| e.state == ExchangeState::AwaitingModeratorDecision)
            .unwrap_or(false);

        if !awaiting_decision {
            return vec![answered, Action::send(chat, messages::ALREADY_HANDLED)];
        }

        let mut actions = Vec::new();

        match decision.kind {
            DecisionKind::Approve => {
                let exchange = match state.exchanges.remove(&decision.exchange) {
                    Some(exchange) => exchange,
                    None => return vec![answered],
                };

                if let Some(message) = exchange.moderator_message {
                    actions.push(Action::RemoveInlineKeyboard {
                        chat: exchange.moderator,
                        message,
                    });
                }
                actions.push(Action::send_with(
                    exchange.requester,
                    messages::operator_answer(&exchange.answer),
                    Keyboard::Feedback,
                ));
                actions.push(Action::send(chat, messages::ANSWER_DELIVERED));
                actions.push(answered);

                tracing::info!(
                    "Exchange {} approved, delivered to chat {}",
                    exchange.id,
                    exchange.requester
                );
            }
            DecisionKind::Edit => {
                let (moderator, message) = match state.exchanges.get_mut(&decision.exchange) {
                    Some(exchange) => {
                        exchange.state = ExchangeState::AwaitingModeratorEdit;
                        (exchange.moderator, exchange.moderator_message)
                    }
                    None => return vec![answered],
                };

                // Only one edit can be typed at a time; the older one goes
                // back to awaiting a decision
                if let ChatState::EditingExchange(previous) = state.chat_state(chat) {
                    if previous != decision.exchange {
                        actions.extend(state.reoffer(previous));
                    }
                }
                state.set_chat_state(chat, ChatState::EditingExchange(decision.exchange));

                if let Some(message) = message {
                    actions.push(Action::RemoveInlineKeyboard {
                        chat: moderator,
                        message,
                    });
                }
                actions.push(Action::send(chat, messages::ENTER_EDITED_ANSWER));
                actions.push(answered);

                tracing::info!("Exchange {} is being edited", decision.exchange);
            }
        }

        actions
    }

    fn deliver_edit(
        state: &mut GateState,
        chat: ChatId,
        id: ExchangeId,
        text: &str,
    ) -> Vec<Action> {
        let exchange = match state.exchanges.remove(&id) {
            Some(exchange) => exchange,
            None => return vec![Action::send(chat, messages::ALREADY_HANDLED)],
        };

        tracing::info!(
            "Exchange {} answered by the moderator, delivered to chat {}",
            exchange.id,
            exchange.requester
        );

        vec![
            Action::send_with(
                exchange.requester,
                messages::operator_answer(text),
                Keyboard::Feedback,
            ),
            Action::send(chat, messages::EDITED_ANSWER_DELIVERED),
        ]
    }
}
