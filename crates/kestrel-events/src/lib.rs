/// Core event types for kestrel
///
/// This crate provides the request/notice vocabulary shared by the scripting
/// host and the runner, plus the envelope used on the event bus, so consumers
/// can be written without depending on the runner itself.
use std::time::Instant;

use kestrel_world::ConnectionId;
use kestrel_world::config::KestrelConfig;

pub mod notices;
pub mod requests;
pub mod security;
pub mod system_events;

pub use notices::{ServerNotice, SessionId};
pub use requests::{Reply, Request};
pub use security::{SecurityViolation, Severity};
pub use system_events::SystemEvent;

// ============================================================================
// Event Source and Context
// ============================================================================

/// Source of the event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// Inbound message from a client connection
    Network,
    /// Produced by a behavior or dialog script
    Script,
    /// Lifecycle / containment
    System,
}

/// Context information attached to all events
#[derive(Debug, Clone)]
pub struct EventContext {
    /// Connection the event belongs to
    pub connection: ConnectionId,
    /// Sequence number for this event, relative to the connection
    pub sequence: u64,
}

impl EventContext {
    pub fn new(connection: ConnectionId, sequence: u64) -> Self {
        Self {
            connection,
            sequence,
        }
    }
}

// ============================================================================
// Event Envelope
// ============================================================================

#[derive(Debug, Clone)]
pub enum EventType {
    Request(Request),
    Notice(ServerNotice),
    System(SystemEvent),
}

/// Complete event envelope
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event: EventType,
    pub context: EventContext,
    pub timestamp: Instant,
    pub source: EventSource,
}

impl EventEnvelope {
    pub fn new(event: EventType, context: EventContext, source: EventSource) -> Self {
        Self {
            event,
            context,
            timestamp: Instant::now(),
            source,
        }
    }

    pub fn request(request: Request, connection: ConnectionId, sequence: u64) -> Self {
        Self::new(
            EventType::Request(request),
            EventContext::new(connection, sequence),
            EventSource::Network,
        )
    }

    pub fn notice(notice: ServerNotice, connection: ConnectionId, sequence: u64) -> Self {
        Self::new(
            EventType::Notice(notice),
            EventContext::new(connection, sequence),
            EventSource::Script,
        )
    }

    pub fn system(event: SystemEvent, connection: ConnectionId, sequence: u64) -> Self {
        Self::new(
            EventType::System(event),
            EventContext::new(connection, sequence),
            EventSource::System,
        )
    }
}

// ============================================================================
// Event Consumer Trait
// ============================================================================

/// Trait for observing traffic on the event bus (logging, metrics, tests)
pub trait EventConsumer: Send + 'static {
    fn handle_event(&mut self, envelope: EventEnvelope);
}

/// Context provided to consumer factories when creating consumers
pub struct ConsumerContext {
    pub config: KestrelConfig,
}

/// Factory trait for creating event consumers once the server is configured
pub trait ConsumerFactory: Send + Sync + 'static {
    fn create(&self, ctx: &ConsumerContext) -> Box<dyn EventConsumer>;
}

// Allow closures to be used as consumer factories
impl<F> ConsumerFactory for F
where
    F: Fn(&ConsumerContext) -> Box<dyn EventConsumer> + Send + Sync + 'static,
{
    fn create(&self, ctx: &ConsumerContext) -> Box<dyn EventConsumer> {
        (self)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_world::EntityId;

    #[test]
    fn test_session_id_never_repeats_previous() {
        let first = SessionId::generate(None);
        for _ in 0..100 {
            assert_ne!(SessionId::generate(Some(first)), first);
        }
    }

    #[test]
    fn test_envelope_sources() {
        let conn = ConnectionId(3);
        let req = EventEnvelope::request(Request::TalkStart { target: EntityId(1) }, conn, 0);
        assert_eq!(req.source, EventSource::Network);
        assert_eq!(req.context.connection, conn);

        let sys = EventEnvelope::system(SystemEvent::Shutdown, conn, 1);
        assert_eq!(sys.source, EventSource::System);
        assert_eq!(sys.context.sequence, 1);
    }

    #[test]
    fn test_security_violation_display() {
        let violation = SecurityViolation::severe("forged session id");
        assert_eq!(
            violation.to_string(),
            "security violation (severe): forged session id"
        );
    }
}
