//! Behavior scheduling and NPC conversation runtime.
//!
//! Two kinds of content run here. Behaviors are queues of small resumable
//! actions advanced by a per-actor timer. Dialogs are async scripts polled
//! once per inbound client message and suspended whenever they wait for a
//! selection.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod action_queue;
pub mod actions;
pub mod behavior;
pub mod behavior_registry;
pub mod context;
pub mod conversation;
pub mod dialog;
pub mod error;
pub mod hooks;
pub mod memory;
pub mod scheduler;
pub mod step;

pub use action_queue::ActionQueue;
pub use actions::{Say, SayRandomPhrase, Sequence, Timeout, Wait, Wander};
pub use behavior::{Behavior, BehaviorInstance, BehaviorState};
pub use behavior_registry::BehaviorRegistry;
pub use context::{BehaviorContext, StepContext};
pub use conversation::{
    ConversationSession, DialogFuture, DialogScript, DialogTarget, SessionState, Talker,
};
pub use dialog::Dialog;
pub use error::{DialogError, TalkError};
pub use hooks::{END_CONVERSATION, HookOutcome, HookRegistry, HookResult};
pub use memory::MemoryActor;
pub use scheduler::{TickOutcome, TickScheduler};
pub use step::{Action, FnAction, Step, StepStatus, step_fn};

/// Lock a mutex, recovering the data if another thread panicked with it held
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
