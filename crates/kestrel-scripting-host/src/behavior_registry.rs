use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use kestrel_world::config::SchedulerConfig;
use kestrel_world::{Actor, EntityId, Position, SeedSource};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::behavior::Behavior;
use crate::scheduler::TickScheduler;

/// Table of every actor with a behavior, keyed by entity id.
///
/// Handed explicitly to whatever needs to wake or stop actors (the runner,
/// the sandbox); there is no global instance.
pub struct BehaviorRegistry {
    schedulers: RwLock<HashMap<EntityId, Arc<TickScheduler>>>,
    config: SchedulerConfig,
    seeds: Arc<SeedSource>,
    runtime: Handle,
}

impl BehaviorRegistry {
    pub fn new(config: SchedulerConfig, seeds: Arc<SeedSource>, runtime: Handle) -> Self {
        Self {
            schedulers: RwLock::new(HashMap::new()),
            config,
            seeds,
            runtime,
        }
    }

    /// Create the behavior instance for `actor`. An actor registered twice
    /// has its previous instance released.
    pub fn register(
        &self,
        actor: Arc<dyn Actor>,
        behavior: Box<dyn Behavior>,
    ) -> Arc<TickScheduler> {
        let id = actor.id();
        let scheduler = TickScheduler::new(
            actor,
            behavior,
            self.seeds.actor_rng(),
            &self.config,
            self.runtime.clone(),
        );

        let previous = self
            .schedulers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, scheduler.clone());
        if let Some(previous) = previous {
            debug!(target: "scheduler", "Replacing behavior of {}", id);
            previous.release();
        }
        scheduler
    }

    /// Release and forget an actor's behavior
    pub fn unregister(&self, id: EntityId) -> bool {
        let removed = self
            .schedulers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(scheduler) => {
                scheduler.release();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: EntityId) -> Option<Arc<TickScheduler>> {
        self.read().get(&id).cloned()
    }

    pub fn activate(&self, id: EntityId) -> bool {
        match self.get(id) {
            Some(scheduler) => {
                scheduler.activate();
                true
            }
            None => false,
        }
    }

    pub fn deactivate(&self, id: EntityId) -> bool {
        match self.get(id) {
            Some(scheduler) => {
                scheduler.deactivate();
                true
            }
            None => false,
        }
    }

    /// Activate every inactive actor within `radius` of `position` that has
    /// an observer nearby. Returns how many were woken.
    pub fn wake_near(&self, position: Position, radius: f64) -> usize {
        let candidates: Vec<_> = self
            .read()
            .values()
            .filter(|scheduler| !scheduler.is_active())
            .filter(|scheduler| scheduler.actor().position().in_range(&position, radius))
            .cloned()
            .collect();

        let mut woken = 0;
        for scheduler in candidates {
            if scheduler.actor().has_observer_nearby() {
                scheduler.activate();
                woken += 1;
            }
        }
        if woken > 0 {
            debug!(target: "scheduler", "Woke {} actors near {}", woken, position);
        }
        woken
    }

    /// Apply one heartbeat to every registered actor
    pub fn set_interval_all(&self, interval_ms: u64) {
        for scheduler in self.read().values() {
            scheduler.set_interval(interval_ms);
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.read().values().filter(|s| s.is_active()).count()
    }

    /// Release every actor
    pub fn shutdown(&self) {
        let drained: Vec<_> = self
            .schedulers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, scheduler)| scheduler)
            .collect();
        info!(target: "scheduler", "Stopping {} behavior instances", drained.len());
        for scheduler in drained {
            scheduler.release();
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EntityId, Arc<TickScheduler>>> {
        self.schedulers.read().unwrap_or_else(PoisonError::into_inner)
    }
}
