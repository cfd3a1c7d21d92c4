//! Behavior state machine and the per-actor instance it runs in.

use std::fmt;
use std::sync::Arc;

use kestrel_world::{Actor, ActorRng};
use tracing::debug;

use crate::action_queue::ActionQueue;
use crate::context::{BehaviorContext, StepContext};
use crate::scheduler::TickScheduler;

/// States a behavior dispatches on.
///
/// `Idle` and `Aggro` are the base set; content adds its own through
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BehaviorState {
    #[default]
    Idle,
    Aggro,
    Other(&'static str),
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorState::Idle => write!(f, "idle"),
            BehaviorState::Aggro => write!(f, "aggro"),
            BehaviorState::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Content-side behavior routine.
///
/// The scheduler calls [`Behavior::select_state`] and then the matching
/// handler at most once per tick, and only when the action queue was empty
/// at the start of that tick. Handlers enqueue work through the context.
pub trait Behavior: Send {
    /// Pick the state for this tick. The state is not remembered between
    /// ticks; the default is always `Idle`.
    fn select_state(&mut self, _ctx: &mut BehaviorContext<'_>) -> BehaviorState {
        BehaviorState::Idle
    }

    fn idle(&mut self, ctx: &mut BehaviorContext<'_>);

    fn aggro(&mut self, _ctx: &mut BehaviorContext<'_>) {}

    fn other(&mut self, _state: &'static str, _ctx: &mut BehaviorContext<'_>) {}

    /// Called on the first tick after the actor is (re)activated
    fn on_activate(&mut self, _ctx: &mut BehaviorContext<'_>) {}
}

/// Everything one actor's behavior owns: queue, clock, RNG and routine
pub struct BehaviorInstance {
    queue: ActionQueue,
    elapsed_ms: u64,
    rng: ActorRng,
    behavior: Box<dyn Behavior>,
    state: BehaviorState,
}

impl BehaviorInstance {
    pub fn new(behavior: Box<dyn Behavior>, rng: ActorRng) -> Self {
        Self {
            queue: ActionQueue::new(),
            elapsed_ms: 0,
            rng,
            behavior,
            state: BehaviorState::Idle,
        }
    }

    /// Drop queued work and the running cursor
    pub fn reset(&mut self) {
        self.queue.clear();
        self.state = BehaviorState::Idle;
    }

    pub fn advance_clock(&mut self, interval_ms: u64) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(interval_ms);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// State chosen on the last evaluation
    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn drain_once(&mut self, actor: &dyn Actor) -> bool {
        let mut ctx = StepContext::new(actor, &mut self.rng, self.elapsed_ms);
        self.queue.drain_once(&mut ctx)
    }

    pub(crate) fn activated(&mut self, actor: &Arc<dyn Actor>, scheduler: &TickScheduler) {
        let mut ctx = BehaviorContext::new(
            actor.as_ref(),
            &mut self.queue,
            &mut self.rng,
            self.elapsed_ms,
            scheduler,
        );
        self.behavior.on_activate(&mut ctx);
    }

    /// Recompute the state and run its handler once
    pub(crate) fn evaluate(&mut self, actor: &Arc<dyn Actor>, scheduler: &TickScheduler) {
        let mut ctx = BehaviorContext::new(
            actor.as_ref(),
            &mut self.queue,
            &mut self.rng,
            self.elapsed_ms,
            scheduler,
        );

        let state = self.behavior.select_state(&mut ctx);
        if state != self.state {
            debug!(target: "behavior", "{} {} -> {}", actor.id(), self.state, state);
        }
        self.state = state;

        match state {
            BehaviorState::Idle => self.behavior.idle(&mut ctx),
            BehaviorState::Aggro => self.behavior.aggro(&mut ctx),
            BehaviorState::Other(name) => self.behavior.other(name, &mut ctx),
        }
    }
}
