use kestrel_world::{EntityId, Position};
use serde::{Deserialize, Serialize};

use crate::notices::SessionId;

/// Inbound messages from a client connection that this core reacts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Player opened a conversation with `target`
    TalkStart { target: EntityId },
    /// Player closed the conversation window
    TalkEnd { target: EntityId },
    /// Reply to a selectable notice, carrying back its correlation id
    Select { session_id: SessionId, reply: Reply },
    /// Player typed or clicked a keyword during a conversation
    Keyword { target: EntityId, keyword: String },
    /// Player bought something from the NPC's shop window
    Purchase {
        target: EntityId,
        item_id: u64,
        quantity: u32,
    },
    /// Player position update; wakes up nearby creatures
    PlayerMoved { position: Position },
    /// Several requests delivered together
    Batch(Vec<Request>),
}

/// What a suspended conversation resumes with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// One of the offered options, or free text
    Choice(String),
    Keyword(String),
    Purchase { item_id: u64, quantity: u32 },
}

impl Reply {
    pub fn choice(value: impl Into<String>) -> Self {
        Reply::Choice(value.into())
    }

    /// The chosen option if this is a [`Reply::Choice`]
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            Reply::Choice(value) => Some(value),
            _ => None,
        }
    }
}
