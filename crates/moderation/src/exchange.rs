//! Questions awaiting a moderator decision.

use crate::types::{ChatId, ExchangeId, MessageId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Lifecycle of a pending exchange; delivered exchanges are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    AwaitingModeratorDecision,
    AwaitingModeratorEdit,
}

/// One question, its generated answer and where the moderator sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExchange {
    pub id: ExchangeId,
    pub requester: ChatId,
    pub question: String,
    pub answer: String,
    /// Chat of the moderator the exchange was sent to
    pub moderator: ChatId,
    pub moderator_message: Option<MessageId>,
    pub state: ExchangeState,
    pub created_at: DateTime<Utc>,
}

impl PendingExchange {
    pub fn new(requester: ChatId, moderator: ChatId, question: String, answer: String) -> Self {
        Self {
            id: ExchangeId::new(),
            requester,
            question,
            answer,
            moderator,
            moderator_message: None,
            state: ExchangeState::AwaitingModeratorDecision,
            created_at: Utc::now(),
        }
    }
}

/// In-flight exchanges keyed by id.
#[derive(Debug, Default)]
pub struct ExchangeStore {
    exchanges: HashMap<ExchangeId, PendingExchange>,
}

impl ExchangeStore {
    pub fn insert(&mut self, exchange: PendingExchange) -> ExchangeId {
        let id = exchange.id;
        self.exchanges.insert(id, exchange);
        id
    }

    pub fn get(&self, id: &ExchangeId) -> Option<&PendingExchange> {
        self.exchanges.get(id)
    }

    pub fn get_mut(&mut self, id: &ExchangeId) -> Option<&mut PendingExchange> {
        self.exchanges.get_mut(id)
    }

    pub fn remove(&mut self, id: &ExchangeId) -> Option<PendingExchange> {
        self.exchanges.remove(id)
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

/// What the moderator chose for an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    Approve,
    Edit,
}

/// A decision parsed from inline button callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub kind: DecisionKind,
    pub exchange: ExchangeId,
}

impl Decision {
    pub fn approve(exchange: ExchangeId) -> Self {
        Self {
            kind: DecisionKind::Approve,
            exchange,
        }
    }

    pub fn edit(exchange: ExchangeId) -> Self {
        Self {
            kind: DecisionKind::Edit,
            exchange,
        }
    }

    /// Parse `approve:<id>` or `edit:<id>`.
    pub fn parse(data: &str) -> Option<Self> {
        let (action, id) = data.split_once(':')?;
        let exchange = id.parse().ok()?;
        match action {
            "approve" => Some(Self::approve(exchange)),
            "edit" => Some(Self::edit(exchange)),
            _ => None,
        }
    }

    pub fn callback_data(&self) -> String {
        let action = match self.kind {
            DecisionKind::Approve => "approve",
            DecisionKind::Edit => "edit",
        };
        format!("{}:{}", action, self.exchange)
    }
}
