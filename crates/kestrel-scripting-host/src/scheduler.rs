//! Per-actor periodic timer driving one [`BehaviorInstance`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError, Weak};
use std::time::Duration;

use kestrel_world::config::SchedulerConfig;
use kestrel_world::{Actor, ActorRng, EntityId};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::behavior::{Behavior, BehaviorInstance};
use crate::lock;

/// What a single tick ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not active; nothing ran
    Inactive,
    /// No observer nearby; the actor was deactivated
    NoObserver,
    /// Queued work ran; the state machine was skipped
    Drained,
    /// The state machine ran, followed by a second drain
    Evaluated,
    /// Deactivated from inside the state handler
    Deactivated,
}

/// Owns the timer of one actor and ticks its behavior instance.
///
/// The instance sits behind a mutex, so overlapping ticks for the same
/// actor are serialized. Activation state lives in atomics so `deactivate`
/// never waits on that mutex and can be called from inside a tick.
pub struct TickScheduler {
    actor: Arc<dyn Actor>,
    instance: Mutex<BehaviorInstance>,
    timer: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
    active: AtomicBool,
    generation: AtomicU64,
    reset_requested: AtomicBool,
    interval_ms: AtomicU64,
    min_interval_ms: u64,
    ticks: AtomicU64,
}

impl TickScheduler {
    pub fn new(
        actor: Arc<dyn Actor>,
        behavior: Box<dyn Behavior>,
        rng: ActorRng,
        config: &SchedulerConfig,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            actor,
            instance: Mutex::new(BehaviorInstance::new(behavior, rng)),
            timer: Mutex::new(None),
            runtime,
            active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            reset_requested: AtomicBool::new(false),
            interval_ms: AtomicU64::new(config.clamp_interval(config.heartbeat_ms)),
            min_interval_ms: config.min_interval_ms(),
            ticks: AtomicU64::new(0),
        })
    }

    pub fn actor_id(&self) -> EntityId {
        self.actor.id()
    }

    pub fn actor(&self) -> &Arc<dyn Actor> {
        &self.actor
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start ticking, or keep ticking if already active.
    ///
    /// Either way the queue and cursor are reset before the next tick. The
    /// timer only starts when the actor was inactive, and its first tick
    /// happens one interval from now.
    pub fn activate(self: &Arc<Self>) {
        self.reset_requested.store(true, Ordering::SeqCst);
        if self.active.swap(true, Ordering::SeqCst) {
            trace!(target: "scheduler", "{} already active, queue reset", self.actor_id());
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        debug!(target: "scheduler", "Activating {} every {:?}", self.actor_id(), self.interval());

        let handle = self.runtime.spawn(run_timer(Arc::downgrade(self), generation));
        if let Some(previous) = lock(&self.timer).replace(handle) {
            previous.abort();
        }
    }

    /// Stop ticking. Idempotent and safe to call from inside a tick.
    pub fn deactivate(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
        debug!(target: "scheduler", "Deactivated {}", self.actor_id());
    }

    /// Deactivate and drop all queued work, for unloading the actor
    pub fn release(&self) {
        self.deactivate();
        match self.instance.try_lock() {
            Ok(mut instance) => instance.reset(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().reset(),
            // A tick is running right now; it resets on the next activation
            Err(TryLockError::WouldBlock) => self.reset_requested.store(true, Ordering::SeqCst),
        }
    }

    /// Change the heartbeat. Returns the effective interval, never below
    /// the configured floor.
    pub fn set_interval(&self, interval_ms: u64) -> u64 {
        let effective = interval_ms.max(self.min_interval_ms);
        self.interval_ms.store(effective, Ordering::SeqCst);
        effective
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::SeqCst))
    }

    /// Number of ticks that got past the activity check
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn elapsed_ms(&self) -> u64 {
        lock(&self.instance).elapsed_ms()
    }

    /// Queued actions not yet started
    pub fn queue_len(&self) -> usize {
        lock(&self.instance).queue().len()
    }

    /// Nothing queued and nothing running
    pub fn is_idle(&self) -> bool {
        lock(&self.instance).queue().is_empty()
    }

    /// Run one tick now. The timer calls this; tests may too.
    pub fn tick(&self) -> TickOutcome {
        if !self.is_active() {
            return TickOutcome::Inactive;
        }

        let mut instance = lock(&self.instance);

        // Deactivated while waiting for the previous tick
        if !self.is_active() {
            return TickOutcome::Inactive;
        }
        self.ticks.fetch_add(1, Ordering::SeqCst);

        if self.reset_requested.swap(false, Ordering::SeqCst) {
            instance.reset();
            instance.activated(&self.actor, self);
        }

        instance.advance_clock(self.interval_ms.load(Ordering::SeqCst));

        if !self.actor.has_observer_nearby() {
            trace!(target: "scheduler", "No observer near {}", self.actor_id());
            self.deactivate();
            return TickOutcome::NoObserver;
        }

        if instance.drain_once(self.actor.as_ref()) {
            return TickOutcome::Drained;
        }

        instance.evaluate(&self.actor, self);
        if !self.is_active() {
            return TickOutcome::Deactivated;
        }

        instance.drain_once(self.actor.as_ref());
        TickOutcome::Evaluated
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

/// Marks the actor inactive if its timer task unwinds out of a tick, so a
/// later activation can start a fresh timer.
struct TimerGuard {
    scheduler: Weak<TickScheduler>,
    generation: u64,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let Some(scheduler) = self.scheduler.upgrade() else {
            return;
        };
        if scheduler.generation.load(Ordering::SeqCst) == self.generation
            && scheduler.active.swap(false, Ordering::SeqCst)
        {
            scheduler.generation.fetch_add(1, Ordering::SeqCst);
            warn!(target: "scheduler", "Tick of {} panicked; actor deactivated", scheduler.actor_id());
        }
    }
}

async fn run_timer(scheduler: Weak<TickScheduler>, generation: u64) {
    let _guard = TimerGuard {
        scheduler: scheduler.clone(),
        generation,
    };
    loop {
        let interval = match scheduler.upgrade() {
            Some(scheduler) => scheduler.interval(),
            None => return,
        };
        tokio::time::sleep(interval).await;

        let Some(scheduler) = scheduler.upgrade() else {
            return;
        };
        if scheduler.generation.load(Ordering::SeqCst) != generation || !scheduler.is_active() {
            return;
        }
        scheduler.tick();
    }
}
