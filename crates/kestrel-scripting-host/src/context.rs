use std::sync::Arc;

use kestrel_world::{Actor, ActorRng, EntityId, Position};

use crate::action_queue::ActionQueue;
use crate::scheduler::TickScheduler;
use crate::step::Action;

/// What a step cursor sees while it is being advanced
pub struct StepContext<'a> {
    actor: &'a dyn Actor,
    rng: &'a mut ActorRng,
    elapsed_ms: u64,
}

impl<'a> StepContext<'a> {
    pub fn new(actor: &'a dyn Actor, rng: &'a mut ActorRng, elapsed_ms: u64) -> Self {
        Self {
            actor,
            rng,
            elapsed_ms,
        }
    }

    pub fn actor(&self) -> &dyn Actor {
        self.actor
    }

    /// The actor's private random source
    pub fn rng(&mut self) -> &mut ActorRng {
        self.rng
    }

    /// Accumulated behavior time. All timing decisions use this, never the
    /// wall clock.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

/// Context handed to behavior state handlers.
///
/// Gives access to the actor, its private RNG and queue, and to the owning
/// scheduler for reentrant control (`deactivate`, `set_interval`).
pub struct BehaviorContext<'a> {
    actor: &'a dyn Actor,
    queue: &'a mut ActionQueue,
    rng: &'a mut ActorRng,
    elapsed_ms: u64,
    scheduler: &'a TickScheduler,
}

impl<'a> BehaviorContext<'a> {
    pub(crate) fn new(
        actor: &'a dyn Actor,
        queue: &'a mut ActionQueue,
        rng: &'a mut ActorRng,
        elapsed_ms: u64,
        scheduler: &'a TickScheduler,
    ) -> Self {
        Self {
            actor,
            queue,
            rng,
            elapsed_ms,
            scheduler,
        }
    }

    pub fn actor(&self) -> &dyn Actor {
        self.actor
    }

    pub fn actor_id(&self) -> EntityId {
        self.actor.id()
    }

    pub fn position(&self) -> Position {
        self.actor.position()
    }

    pub fn rng(&mut self) -> &mut ActorRng {
        self.rng
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Queue an action; its first step runs before the current tick ends
    pub fn enqueue(&mut self, action: impl Action + 'static) {
        self.queue.push(action);
    }

    /// Queue a shared action template
    pub fn enqueue_shared(&mut self, action: Arc<dyn Action>) {
        self.queue.enqueue(action);
    }

    /// Number of queued actions not yet started
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Stop this actor's timer. Safe to call from inside the tick.
    pub fn deactivate(&self) {
        self.scheduler.deactivate();
    }

    /// Change this actor's heartbeat; returns the effective interval
    pub fn set_interval(&self, interval_ms: u64) -> u64 {
        self.scheduler.set_interval(interval_ms)
    }
}
