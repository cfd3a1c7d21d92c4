use tracing::{debug, error, info, warn};

use kestrel_events::{EventEnvelope, EventType, Request, ServerNotice, SystemEvent};

// Re-export EventConsumer from kestrel-events
pub use kestrel_events::{ConsumerContext, ConsumerFactory, EventConsumer};

/// Event consumer that logs bus traffic (for the CLI sandbox)
pub struct LoggingConsumer {
    /// Log every request and notice, not only lifecycle events
    verbose: bool,
}

impl LoggingConsumer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Create a factory for this consumer
    pub fn from_factory(verbose: bool) -> impl ConsumerFactory {
        move |_ctx: &ConsumerContext| Box::new(LoggingConsumer::new(verbose)) as Box<dyn EventConsumer>
    }
}

impl EventConsumer for LoggingConsumer {
    fn handle_event(&mut self, envelope: EventEnvelope) {
        let conn = envelope.context.connection;
        match envelope.event {
            EventType::Request(request) => {
                if self.verbose {
                    debug!(target: "events", "{} -> {}", conn, describe_request(&request));
                }
            }
            EventType::Notice(notice) => {
                if self.verbose {
                    debug!(target: "events", "{} <- {:?}", conn, notice);
                } else if let ServerNotice::Disconnect { reason } = notice {
                    warn!(target: "events", "{} disconnected: {}", conn, reason);
                }
            }
            EventType::System(system_event) => match system_event {
                SystemEvent::ConnectionOpened { connection } => {
                    info!(target: "events", "Connection opened: {}", connection);
                }
                SystemEvent::ConnectionClosed { connection } => {
                    info!(target: "events", "Connection closed: {}", connection);
                }
                SystemEvent::ConversationStarted { connection, target } => {
                    info!(target: "events", "{} started talking to {}", connection, target);
                }
                SystemEvent::ConversationEnded { connection, target } => {
                    info!(target: "events", "{} finished talking to {}", connection, target);
                }
                SystemEvent::SessionInvalidated {
                    connection,
                    expected_target,
                } => {
                    warn!(target: "events", "{} sent a stale reply (expected target {:?})", connection, expected_target);
                }
                SystemEvent::SecurityViolation {
                    connection,
                    severity,
                    report,
                } => {
                    error!(target: "events", "SECURITY {} ({}): {}", connection, severity, report);
                }
                SystemEvent::Shutdown => {
                    info!(target: "events", "Server shutting down");
                }
            },
        }
    }
}

fn describe_request(request: &Request) -> String {
    match request {
        Request::TalkStart { target } => format!("talk_start {target}"),
        Request::TalkEnd { target } => format!("talk_end {target}"),
        Request::Select { session_id, reply } => format!("select {session_id} {reply:?}"),
        Request::Keyword { target, keyword } => format!("keyword {target} {keyword:?}"),
        Request::Purchase {
            target,
            item_id,
            quantity,
        } => format!("purchase {target} {quantity}x{item_id}"),
        Request::PlayerMoved { position } => format!("moved to {position}"),
        Request::Batch(requests) => format!("batch of {}", requests.len()),
    }
}
