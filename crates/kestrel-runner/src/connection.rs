//! Request handling for one client connection.

use std::sync::Arc;

use anyhow::Context as _;
use kestrel_events::{Reply, Request, SecurityViolation, ServerNotice, SessionId, SystemEvent};
use kestrel_scripting_host::{ConversationSession, SessionState, TalkError, Talker};
use kestrel_world::{ConnectionId, EntityId, Position};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatch_guard::{self, AggregateError};
use crate::event_bus::EventSender;
use crate::penalty::PenaltyAction;
use crate::server_context::ServerContext;

/// Owns the conversation session of one connection and routes its requests
pub struct ConnectionRunner {
    connection: ConnectionId,
    talker: Talker,
    session: ConversationSession,
    ctx: Arc<ServerContext>,
    notices: UnboundedSender<ServerNotice>,
    events: EventSender,
    disconnected: bool,
}

impl ConnectionRunner {
    pub fn new(
        ctx: Arc<ServerContext>,
        talker: Talker,
        notices: UnboundedSender<ServerNotice>,
    ) -> Self {
        let connection = talker.connection;
        let session = ConversationSession::new(
            connection,
            notices.clone(),
            ctx.hooks.clone(),
            ctx.config.dialog.talk_range,
        );
        let events = ctx.event_bus.create_sender(connection);
        events.system(SystemEvent::ConnectionOpened { connection });

        Self {
            connection,
            talker,
            session,
            ctx,
            notices,
            events,
            disconnected: false,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn position(&self) -> Position {
        self.talker.position
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Handle one inbound request.
    ///
    /// Security violations are contained here and penalized; every other
    /// failure is returned to the caller.
    pub fn handle(&mut self, request: Request) -> anyhow::Result<()> {
        if self.disconnected {
            return Ok(());
        }
        self.events.request(request.clone());

        let result = self.dispatch(request);
        let mut violations = Vec::new();
        let result = dispatch_guard::guard(result, &mut |violation| {
            violations.push(violation.clone());
        });
        for violation in violations {
            self.penalize(violation);
        }
        result.map(|_| ())
    }

    /// Release the session and mark the connection closed
    pub fn disconnect(&mut self) {
        if self.disconnected {
            return;
        }
        self.end_session();
        self.session.clear();
        self.disconnected = true;
        self.events.system(SystemEvent::ConnectionClosed {
            connection: self.connection,
        });
    }

    /// Serve requests until the client goes away, a penalty drops it, or
    /// shutdown is signalled
    pub async fn run(
        mut self,
        mut requests: UnboundedReceiver<Request>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(target: "dispatch", "{} serving requests", self.connection);
        loop {
            tokio::select! {
                request = requests.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    if let Err(e) = self.handle(request) {
                        error!(target: "dispatch", "{} request failed: {:#}", self.connection, e);
                    }
                    if self.disconnected {
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!(target: "dispatch", "{} received shutdown signal", self.connection);
                    break;
                }
            }
        }
        self.disconnect();
    }

    fn dispatch(&mut self, request: Request) -> anyhow::Result<()> {
        match request {
            Request::TalkStart { target } => self.talk_start(target),
            Request::TalkEnd { target } => self.talk_end(target),
            Request::Select { session_id, reply } => self.select(session_id, reply),
            Request::Keyword { target, keyword } => {
                self.resume_with(target, Reply::Keyword(keyword))
            }
            Request::Purchase {
                target,
                item_id,
                quantity,
            } => self.resume_with(target, Reply::Purchase { item_id, quantity }),
            Request::PlayerMoved { position } => {
                self.talker.position = position;
                self.ctx
                    .behaviors
                    .wake_near(position, self.ctx.config.scheduler.wake_radius);
                Ok(())
            }
            Request::Batch(requests) => {
                let errors: Vec<_> = requests
                    .into_iter()
                    .filter_map(|request| self.dispatch(request).err())
                    .collect();
                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(AggregateError::new(errors).into())
                }
            }
        }
    }

    fn talk_start(&mut self, target: EntityId) -> anyhow::Result<()> {
        let Some(npc) = self.ctx.npcs.get(target) else {
            return Err(SecurityViolation::moderate(format!(
                "talk request for unknown entity {target}"
            ))
            .into());
        };

        let previous = self.session.target_id();
        match self.session.start(npc, self.talker) {
            Ok(()) => {
                if let Some(previous) = previous {
                    self.ended(previous);
                }
                self.events.system(SystemEvent::ConversationStarted {
                    connection: self.connection,
                    target,
                });
                if self.session.state() == SessionState::Ended {
                    self.ended(target);
                }
                Ok(())
            }
            Err(e @ TalkError::Unauthorized { .. }) => {
                Err(SecurityViolation::mild(e.to_string()).into())
            }
            Err(e @ (TalkError::NoScript(_) | TalkError::OutOfRange { .. })) => {
                debug!(target: "dialog", "{} talk rejected: {}", self.connection, e);
                self.send(ServerNotice::TalkRejected {
                    target,
                    reason: e.to_string(),
                });
                Ok(())
            }
            Err(TalkError::Dialog(e)) => {
                if let Some(previous) = previous {
                    self.ended(previous);
                }
                self.ended(target);
                Err(e).with_context(|| format!("starting conversation with {target}"))
            }
        }
    }

    fn talk_end(&mut self, target: EntityId) -> anyhow::Result<()> {
        if !self.session.is_valid(Some(target)) {
            self.invalid_resume(Some(target));
            return Ok(());
        }
        let result = self.session.talk_end();
        self.after_resume(target);
        result.with_context(|| format!("ending conversation with {target}"))
    }

    fn select(&mut self, session_id: SessionId, reply: Reply) -> anyhow::Result<()> {
        if !self.session.is_valid(None) || !self.session.is_awaiting(session_id) {
            self.invalid_resume(None);
            return Ok(());
        }
        self.resume(reply)
    }

    fn resume_with(&mut self, target: EntityId, reply: Reply) -> anyhow::Result<()> {
        if !self.session.is_valid(Some(target)) || self.session.session_id().is_none() {
            self.invalid_resume(Some(target));
            return Ok(());
        }
        self.resume(reply)
    }

    fn resume(&mut self, reply: Reply) -> anyhow::Result<()> {
        let Some(target) = self.session.target_id() else {
            return Ok(());
        };
        self.session.set_response(reply);
        let result = self.session.resume();
        self.after_resume(target);
        result.with_context(|| format!("resuming conversation with {target}"))
    }

    fn after_resume(&mut self, target: EntityId) {
        if self.session.state() == SessionState::Ended {
            self.ended(target);
        }
    }

    /// A resume that does not match the session: end it rather than let it
    /// touch anything
    fn invalid_resume(&mut self, expected_target: Option<EntityId>) {
        warn!(
            target: "dialog",
            "{} sent a reply that does not match its session (expected {:?}, current {:?}); ending it",
            self.connection,
            expected_target,
            self.session.target_id()
        );
        self.end_session();
        self.events.system(SystemEvent::SessionInvalidated {
            connection: self.connection,
            expected_target,
        });
    }

    fn end_session(&mut self) {
        if let Some(target) = self.session.target_id() {
            self.session.end();
            self.send(ServerNotice::Close { target, text: None });
            self.ended(target);
        }
    }

    fn ended(&self, target: EntityId) {
        self.events.system(SystemEvent::ConversationEnded {
            connection: self.connection,
            target,
        });
    }

    fn penalize(&mut self, violation: SecurityViolation) {
        warn!(target: "dispatch", "{} {}", self.connection, violation);
        self.events.system(SystemEvent::SecurityViolation {
            connection: self.connection,
            severity: violation.severity,
            report: violation.report.clone(),
        });

        match self.ctx.penalty.apply(self.connection, &violation) {
            PenaltyAction::Ignore => {}
            PenaltyAction::Warn => self.send(ServerNotice::Warning {
                text: violation.report,
            }),
            PenaltyAction::Disconnect => {
                self.send(ServerNotice::Disconnect {
                    reason: violation.report,
                });
                self.disconnect();
            }
        }
    }

    fn send(&self, notice: ServerNotice) {
        self.events.notice(notice.clone());
        // The client may be gone already
        let _ = self.notices.send(notice);
    }
}
