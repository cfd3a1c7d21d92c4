//! Primitives available to dialog scripts.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use kestrel_events::{Reply, ServerNotice, SessionId};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::conversation::{DialogTarget, Talker};
use crate::error::DialogError;
use crate::hooks::{HookOutcome, HookRegistry};
use crate::lock;

/// Correlation state shared between a running script and its session
#[derive(Debug, Default)]
pub(crate) struct DialogShared {
    pub(crate) session_id: Option<SessionId>,
    pub(crate) response: Option<Reply>,
    pub(crate) awaiting: bool,
    pub(crate) closing: bool,
}

/// Handle a dialog script uses to talk to the player.
///
/// Cheap to clone; hook fragments get their own copy.
#[derive(Clone)]
pub struct Dialog {
    shared: Arc<Mutex<DialogShared>>,
    target: Arc<DialogTarget>,
    talker: Talker,
    notices: UnboundedSender<ServerNotice>,
    hooks: Arc<HookRegistry>,
}

impl Dialog {
    pub(crate) fn new(
        target: Arc<DialogTarget>,
        talker: Talker,
        notices: UnboundedSender<ServerNotice>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(DialogShared::default())),
            target,
            talker,
            notices,
            hooks,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Mutex<DialogShared>> {
        &self.shared
    }

    pub fn target(&self) -> &DialogTarget {
        &self.target
    }

    pub fn talker(&self) -> &Talker {
        &self.talker
    }

    /// Send one line of dialog
    pub fn msg(&self, text: impl Into<String>) {
        self.send(ServerNotice::Message {
            target: self.target.id,
            text: text.into(),
        });
    }

    /// Offer `options` and suspend until the player picks one
    pub async fn select(&self, options: &[&str]) -> Reply {
        self.select_from(None, options.iter().map(|o| o.to_string()).collect())
            .await
    }

    /// Like [`Dialog::select`], with an optional prompt line
    pub async fn select_from(&self, prompt: Option<&str>, options: Vec<String>) -> Reply {
        let session_id = {
            let mut shared = lock(&self.shared);
            let session_id = SessionId::generate(shared.session_id);
            shared.session_id = Some(session_id);
            shared.response = None;
            shared.awaiting = true;
            session_id
        };
        trace!(target: "dialog", "{} awaits selection {}", self.target.id, session_id);

        self.send(ServerNotice::Selectable {
            target: self.target.id,
            session_id,
            prompt: prompt.map(str::to_string),
            options,
        });

        AwaitReply {
            shared: self.shared.clone(),
        }
        .await
    }

    /// Close the dialog window. The script never resumes after this; the
    /// session ends as soon as control returns to it.
    pub async fn close(&self, text: Option<&str>) -> Result<(), DialogError> {
        lock(&self.shared).closing = true;
        self.send(ServerNotice::Close {
            target: self.target.id,
            text: text.map(str::to_string),
        });
        std::future::pending().await
    }

    /// Run the hook pipeline registered for this target under `name`
    pub async fn hook(&self, name: &str) -> Result<HookOutcome, DialogError> {
        self.hooks.run(&self.target.name, name, self).await
    }

    fn send(&self, notice: ServerNotice) {
        // The connection may already be gone; the session gets released then
        let _ = self.notices.send(notice);
    }
}

/// Suspension point of a selection. Polled by the owning session only after
/// a reply was stored, so it never needs to register a waker.
struct AwaitReply {
    shared: Arc<Mutex<DialogShared>>,
}

impl Future for AwaitReply {
    type Output = Reply;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Reply> {
        let mut shared = lock(&self.shared);
        match shared.response.take() {
            Some(reply) => {
                shared.awaiting = false;
                Poll::Ready(reply)
            }
            None => Poll::Pending,
        }
    }
}
