use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use crate::context::StepContext;
use crate::step::{Action, Step};

/// Per-actor FIFO of pending actions plus the cursor of the one in progress
#[derive(Default)]
pub struct ActionQueue {
    pending: VecDeque<Arc<dyn Action>>,
    current: Option<Box<dyn Step>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: impl Action + 'static) {
        self.pending.push_back(Arc::new(action));
    }

    pub fn enqueue(&mut self, action: Arc<dyn Action>) {
        self.pending.push_back(action);
    }

    /// Drop every pending action and abandon the current cursor
    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    /// Number of actions waiting to start
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }

    /// Whether an action has been started and not yet finished
    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Advance the head action by one step.
    ///
    /// Starts the next pending action if nothing is in progress and drops the
    /// cursor once it reports done. Returns `false` only when there was
    /// nothing to run at all.
    pub fn drain_once(&mut self, ctx: &mut StepContext<'_>) -> bool {
        if self.current.is_none() {
            let Some(action) = self.pending.pop_front() else {
                return false;
            };
            trace!(target: "behavior", "{} starts {}", ctx.actor().id(), action.name());
            self.current = Some(action.start());
        }

        if let Some(current) = self.current.as_mut() {
            if current.advance(ctx).is_done() {
                self.current = None;
            }
        }
        true
    }
}
