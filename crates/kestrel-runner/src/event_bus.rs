// Event bus shared by every connection of one server.
// The runner owns the bus; connections publish through an EventSender and
// consumers subscribe independently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use kestrel_events::{EventEnvelope, Request, ServerNotice, SystemEvent};
use kestrel_world::ConnectionId;

/// Publishing handle bound to one connection
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: broadcast::Sender<EventEnvelope>,
    connection: ConnectionId,
    sequence: Arc<AtomicU64>,
}

impl EventSender {
    pub fn new(sender: broadcast::Sender<EventEnvelope>, connection: ConnectionId) -> Self {
        Self {
            sender,
            connection,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn publish(&self, envelope: EventEnvelope) {
        // No subscribers is fine
        let _ = self.sender.send(envelope);
    }

    pub fn request(&self, request: Request) {
        self.publish(EventEnvelope::request(request, self.connection, self.next_sequence()));
    }

    pub fn notice(&self, notice: ServerNotice) {
        self.publish(EventEnvelope::notice(notice, self.connection, self.next_sequence()));
    }

    pub fn system(&self, event: SystemEvent) {
        self.publish(EventEnvelope::system(event, self.connection, self.next_sequence()));
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }
}

/// Central event bus that manages event distribution
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<EventEnvelope>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (EventBus { sender }, receiver)
    }

    pub fn create_sender(&self, connection: ConnectionId) -> EventSender {
        EventSender::new(self.sender.clone(), connection)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
