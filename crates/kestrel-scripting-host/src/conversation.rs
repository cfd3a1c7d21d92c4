//! Per-connection dialog sessions.
//!
//! A session owns at most one running dialog script. The script is an
//! ordinary future polled by hand: every `resume` polls it once, and it runs
//! until it finishes, closes the window or waits for a selection. No worker
//! is parked while the player thinks; the next inbound reply drives it on.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use kestrel_events::{Reply, ServerNotice, SessionId};
use kestrel_world::{ConnectionId, EntityId, Position};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::dialog::Dialog;
use crate::error::{DialogError, TalkError};
use crate::hooks::{END_CONVERSATION, HookRegistry};
use crate::lock;

pub type DialogFuture = BoxFuture<'static, Result<(), DialogError>>;

/// Entry point of an NPC conversation
pub trait DialogScript: Send + Sync {
    fn talk(&self, dialog: Dialog) -> DialogFuture;
}

impl<F> DialogScript for F
where
    F: Fn(Dialog) -> DialogFuture + Send + Sync,
{
    fn talk(&self, dialog: Dialog) -> DialogFuture {
        (self)(dialog)
    }
}

/// An NPC players can talk to
#[derive(Clone)]
pub struct DialogTarget {
    pub id: EntityId,
    /// Hook subject for this NPC
    pub name: String,
    pub position: Position,
    pub script: Option<Arc<dyn DialogScript>>,
    /// Minimum talker authority; 0 lets everyone talk
    pub required_authority: u8,
    /// Skip the range check (scripted conversations started from afar)
    pub bypass_distance: bool,
}

impl DialogTarget {
    pub fn new(id: EntityId, name: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            script: None,
            required_authority: 0,
            bypass_distance: false,
        }
    }

    pub fn with_script(mut self, script: impl DialogScript + 'static) -> Self {
        self.script = Some(Arc::new(script));
        self
    }

    pub fn with_required_authority(mut self, authority: u8) -> Self {
        self.required_authority = authority;
        self
    }

    pub fn with_distance_bypass(mut self) -> Self {
        self.bypass_distance = true;
        self
    }
}

impl fmt::Debug for DialogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogTarget")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("position", &self.position)
            .field("has_script", &self.script.is_some())
            .field("required_authority", &self.required_authority)
            .field("bypass_distance", &self.bypass_distance)
            .finish()
    }
}

/// The player side of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Talker {
    pub id: EntityId,
    pub connection: ConnectionId,
    pub position: Position,
    pub authority: u8,
}

impl Talker {
    pub fn new(id: EntityId, connection: ConnectionId, position: Position) -> Self {
        Self {
            id,
            connection,
            position,
            authority: 0,
        }
    }

    pub fn with_authority(mut self, authority: u8) -> Self {
        self.authority = authority;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Started,
    /// Waiting for a selection reply
    Suspended,
    Ended,
}

struct ActiveDialog {
    target: Arc<DialogTarget>,
    dialog: Dialog,
    continuation: DialogFuture,
}

/// Dialog state of one connection
pub struct ConversationSession {
    connection: ConnectionId,
    notices: UnboundedSender<ServerNotice>,
    hooks: Arc<HookRegistry>,
    talk_range: f64,
    active: Option<ActiveDialog>,
    state: SessionState,
}

impl ConversationSession {
    pub fn new(
        connection: ConnectionId,
        notices: UnboundedSender<ServerNotice>,
        hooks: Arc<HookRegistry>,
        talk_range: f64,
    ) -> Self {
        Self {
            connection,
            notices,
            hooks,
            talk_range,
            active: None,
            state: SessionState::Empty,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn target_id(&self) -> Option<EntityId> {
        self.active.as_ref().map(|active| active.target.id)
    }

    /// Correlation id of the pending selection, if any
    pub fn session_id(&self) -> Option<SessionId> {
        let active = self.active.as_ref()?;
        let shared = lock(active.dialog.shared());
        shared.awaiting.then_some(shared.session_id).flatten()
    }

    /// Start talking to `target`. On failure any existing session is left
    /// untouched; on success it is discarded and the new script runs up to
    /// its first suspension point.
    pub fn start(&mut self, target: Arc<DialogTarget>, talker: Talker) -> Result<(), TalkError> {
        let Some(script) = target.script.clone() else {
            return Err(TalkError::NoScript(target.id));
        };

        if !target.bypass_distance {
            let distance = talker.position.distance(&target.position);
            if distance > self.talk_range {
                return Err(TalkError::OutOfRange {
                    target: target.id,
                    distance,
                    range: self.talk_range,
                });
            }
        }

        if talker.authority < target.required_authority {
            return Err(TalkError::Unauthorized {
                target: target.id,
                required: target.required_authority,
                actual: talker.authority,
            });
        }

        if let Some(previous) = self.active.take() {
            debug!(target: "dialog", "{} drops conversation with {}", self.connection, previous.target.id);
        }

        let dialog = Dialog::new(target.clone(), talker, self.notices.clone(), self.hooks.clone());
        let continuation = script.talk(dialog.clone());
        debug!(target: "dialog", "{} starts talking to {}", self.connection, target.id);

        self.active = Some(ActiveDialog {
            target,
            dialog,
            continuation,
        });
        self.state = SessionState::Started;
        self.resume()?;
        Ok(())
    }

    /// Run the script until it finishes or suspends. No-op without a session.
    pub fn resume(&mut self) -> Result<(), DialogError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        self.state = SessionState::Started;

        let mut cx = Context::from_waker(noop_waker_ref());
        let poll = active.continuation.as_mut().poll(&mut cx);
        let (awaiting, closing) = {
            let shared = lock(active.dialog.shared());
            (shared.awaiting, shared.closing)
        };

        match poll {
            Poll::Ready(Ok(())) => {
                self.end();
                Ok(())
            }
            Poll::Ready(Err(error)) => {
                warn!(target: "dialog", "{} dialog failed: {}", self.connection, error);
                self.end();
                Err(error)
            }
            Poll::Pending if closing => {
                self.end();
                Ok(())
            }
            Poll::Pending if awaiting => {
                self.state = SessionState::Suspended;
                Ok(())
            }
            Poll::Pending => {
                self.end();
                Err(DialogError::Stalled)
            }
        }
    }

    /// Whether a resume may touch this session. With `expected`, the session
    /// must also be talking to that target.
    pub fn is_valid(&self, expected: Option<EntityId>) -> bool {
        match (&self.active, expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(active), Some(id)) => active.target.id == id,
        }
    }

    /// Whether the session waits for exactly this selection
    pub fn is_awaiting(&self, session_id: SessionId) -> bool {
        self.session_id() == Some(session_id)
    }

    /// Store the reply for the pending selection. Refused when nothing is
    /// waiting for one.
    pub fn set_response(&mut self, reply: Reply) -> bool {
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        let mut shared = lock(active.dialog.shared());
        if !shared.awaiting {
            return false;
        }
        shared.response = Some(reply);
        true
    }

    /// Player closed the window: run the target's end hook, then close
    pub fn talk_end(&mut self) -> Result<(), DialogError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        let dialog = active.dialog.clone();
        {
            let mut shared = lock(dialog.shared());
            shared.awaiting = false;
            shared.response = None;
        }
        active.continuation = Box::pin(async move {
            dialog.hook(END_CONVERSATION).await?;
            dialog.close(None).await
        });
        self.resume()
    }

    pub fn end(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(target: "dialog", "{} ends conversation with {}", self.connection, active.target.id);
            self.state = SessionState::Ended;
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.state = SessionState::Empty;
    }
}
