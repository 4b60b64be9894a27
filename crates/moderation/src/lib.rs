//! Moderator-gated delivery of generated answers.
//!
//! No generated answer reaches a requester until the authenticated
//! moderator approves it or replaces it with their own text.

pub mod exchange;
pub mod gate;
pub mod messages;
pub mod session;
pub mod types;

pub use exchange::{Decision, DecisionKind, ExchangeState, ExchangeStore, PendingExchange};
pub use gate::{ModerationGate, RegisteredExchange, Submission, SubmissionKind, TextOutcome};
pub use session::{ChatState, Credentials};
pub use types::{Action, ChatId, ExchangeId, Keyboard, MessageId};
