use kestrel_world::{ConnectionId, EntityId};

use crate::security::Severity;

/// Lifecycle and containment events published on the event bus
#[derive(Debug, Clone)]
pub enum SystemEvent {
    ConnectionOpened { connection: ConnectionId },
    ConnectionClosed { connection: ConnectionId },
    ConversationStarted {
        connection: ConnectionId,
        target: EntityId,
    },
    ConversationEnded {
        connection: ConnectionId,
        target: EntityId,
    },
    /// A resume arrived for a session that no longer matches; the session was ended
    SessionInvalidated {
        connection: ConnectionId,
        expected_target: Option<EntityId>,
    },
    /// A security violation was contained at the dispatch boundary
    SecurityViolation {
        connection: ConnectionId,
        severity: Severity,
        report: String,
    },
    /// Server shutdown requested
    Shutdown,
}
