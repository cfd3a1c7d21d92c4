use kestrel_world::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque correlation id for one pending selection.
///
/// A fresh id is drawn for every selectable notice, so a reply can only
/// resume the exact suspension point it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Draw a random id that differs from `previous`
    pub fn generate(previous: Option<SessionId>) -> Self {
        loop {
            let id = SessionId(rand::random::<u64>());
            if Some(id) != previous {
                return id;
            }
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Outbound messages to one client connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerNotice {
    /// A line of NPC dialog
    Message { target: EntityId, text: String },
    /// The client should let the player pick; the reply must carry `session_id`
    Selectable {
        target: EntityId,
        session_id: SessionId,
        prompt: Option<String>,
        options: Vec<String>,
    },
    /// The conversation window closes
    Close {
        target: EntityId,
        text: Option<String>,
    },
    /// A talk request was refused
    TalkRejected { target: EntityId, reason: String },
    /// Protocol abuse detected
    Warning { text: String },
    /// The server is dropping this connection
    Disconnect { reason: String },
}
