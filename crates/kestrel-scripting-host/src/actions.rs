//! Built-in behavior actions.
//!
//! Every action here is a template; `start()` creates a cursor holding the
//! per-run state. Timing is measured against the actor's accumulated
//! behavior time so identical tick sequences with identical seeds replay
//! identically.

use std::f64::consts::TAU;
use std::sync::Arc;

use kestrel_world::Position;
use rand::Rng;
use tracing::trace;

use crate::context::StepContext;
use crate::step::{Action, Step, StepStatus};

/// Say one line, done immediately
#[derive(Debug, Clone)]
pub struct Say {
    message: String,
}

impl Say {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Action for Say {
    fn start(&self) -> Box<dyn Step> {
        Box::new(SayStep {
            message: self.message.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "say"
    }
}

struct SayStep {
    message: String,
}

impl Step for SayStep {
    fn advance(&mut self, ctx: &mut StepContext<'_>) -> StepStatus {
        ctx.actor().say(&self.message);
        StepStatus::Done
    }
}

/// Say one line picked with the actor's RNG, done immediately.
/// An empty phrase list says nothing.
#[derive(Debug, Clone)]
pub struct SayRandomPhrase {
    phrases: Arc<[String]>,
}

impl SayRandomPhrase {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases.into_iter().map(Into::into).collect(),
        }
    }
}

impl Action for SayRandomPhrase {
    fn start(&self) -> Box<dyn Step> {
        Box::new(SayRandomPhraseStep {
            phrases: self.phrases.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "say_random_phrase"
    }
}

struct SayRandomPhraseStep {
    phrases: Arc<[String]>,
}

impl Step for SayRandomPhraseStep {
    fn advance(&mut self, ctx: &mut StepContext<'_>) -> StepStatus {
        if !self.phrases.is_empty() {
            let index = ctx.rng().gen_range(0..self.phrases.len());
            ctx.actor().say(&self.phrases[index]);
        }
        StepStatus::Done
    }
}

/// Wait a random duration in `[min_ms, max_ms]`
#[derive(Debug, Clone, Copy)]
pub struct Wait {
    min_ms: u64,
    max_ms: u64,
}

impl Wait {
    /// `max_ms` below `min_ms` is raised to `min_ms`
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            max_ms: max_ms.max(min_ms),
        }
    }

    pub fn exactly(duration_ms: u64) -> Self {
        Self::new(duration_ms, duration_ms)
    }
}

impl Action for Wait {
    fn start(&self) -> Box<dyn Step> {
        Box::new(WaitStep {
            min_ms: self.min_ms,
            max_ms: self.max_ms,
            until: None,
        })
    }

    fn name(&self) -> &'static str {
        "wait"
    }
}

struct WaitStep {
    min_ms: u64,
    max_ms: u64,
    until: Option<u64>,
}

impl Step for WaitStep {
    fn advance(&mut self, ctx: &mut StepContext<'_>) -> StepStatus {
        let until = match self.until {
            Some(until) => until,
            None => {
                let duration = ctx.rng().gen_range(self.min_ms..=self.max_ms);
                let until = ctx.elapsed_ms().saturating_add(duration);
                self.until = Some(until);
                until
            }
        };

        if ctx.elapsed_ms() >= until {
            StepStatus::Done
        } else {
            StepStatus::Pending
        }
    }
}

/// Walk to one random point in the ring `[min_distance, max_distance]`
/// around the current position
#[derive(Debug, Clone, Copy)]
pub struct Wander {
    min_distance: u32,
    max_distance: u32,
}

impl Wander {
    /// `max_distance` below `min_distance` is raised to `min_distance`
    pub fn new(min_distance: u32, max_distance: u32) -> Self {
        Self {
            min_distance,
            max_distance: max_distance.max(min_distance),
        }
    }

    pub fn min_distance(&self) -> u32 {
        self.min_distance
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }
}

impl Action for Wander {
    fn start(&self) -> Box<dyn Step> {
        Box::new(WanderStep {
            min_distance: self.min_distance,
            max_distance: self.max_distance,
            destination: None,
        })
    }

    fn name(&self) -> &'static str {
        "wander"
    }
}

struct WanderStep {
    min_distance: u32,
    max_distance: u32,
    destination: Option<Position>,
}

impl Step for WanderStep {
    fn advance(&mut self, ctx: &mut StepContext<'_>) -> StepStatus {
        let destination = match self.destination {
            Some(destination) => destination,
            None => {
                let angle = ctx.rng().gen_range(0.0..TAU);
                let distance = ctx
                    .rng()
                    .gen_range(f64::from(self.min_distance)..=f64::from(self.max_distance));
                let destination = ctx.actor().position().offset_polar(angle, distance);
                trace!(target: "behavior", "{} wanders to {}", ctx.actor().id(), destination);
                ctx.actor().move_to(destination);
                self.destination = Some(destination);
                destination
            }
        };

        if ctx.actor().has_arrived(destination) {
            StepStatus::Done
        } else {
            StepStatus::Pending
        }
    }
}

/// Run `inner` for at most `duration_ms` of behavior time
#[derive(Clone)]
pub struct Timeout {
    duration_ms: u64,
    inner: Arc<dyn Action>,
}

impl Timeout {
    pub fn new(duration_ms: u64, inner: impl Action + 'static) -> Self {
        Self {
            duration_ms,
            inner: Arc::new(inner),
        }
    }
}

impl Action for Timeout {
    fn start(&self) -> Box<dyn Step> {
        Box::new(TimeoutStep {
            duration_ms: self.duration_ms,
            deadline: None,
            inner: Some(self.inner.start()),
        })
    }

    fn name(&self) -> &'static str {
        "timeout"
    }
}

struct TimeoutStep {
    duration_ms: u64,
    deadline: Option<u64>,
    inner: Option<Box<dyn Step>>,
}

impl Step for TimeoutStep {
    fn advance(&mut self, ctx: &mut StepContext<'_>) -> StepStatus {
        let deadline = *self
            .deadline
            .get_or_insert_with(|| ctx.elapsed_ms().saturating_add(self.duration_ms));

        if ctx.elapsed_ms() >= deadline {
            // Abandon whatever the inner cursor was doing
            self.inner = None;
            return StepStatus::Done;
        }

        let Some(inner) = self.inner.as_mut() else {
            return StepStatus::Done;
        };

        let status = inner.advance(ctx);
        if status.is_done() {
            self.inner = None;
        }
        status
    }
}

/// Run several actions back to back inside one queue slot
#[derive(Clone, Default)]
pub struct Sequence {
    actions: Vec<Arc<dyn Action>>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Action for Sequence {
    fn start(&self) -> Box<dyn Step> {
        Box::new(SequenceStep {
            actions: self.actions.clone(),
            index: 0,
            current: None,
        })
    }

    fn name(&self) -> &'static str {
        "sequence"
    }
}

struct SequenceStep {
    actions: Vec<Arc<dyn Action>>,
    index: usize,
    current: Option<Box<dyn Step>>,
}

impl Step for SequenceStep {
    fn advance(&mut self, ctx: &mut StepContext<'_>) -> StepStatus {
        let Some(action) = self.actions.get(self.index) else {
            return StepStatus::Done;
        };
        let current = self.current.get_or_insert_with(|| action.start());

        if current.advance(ctx).is_done() {
            self.current = None;
            self.index += 1;
        }

        if self.index >= self.actions.len() {
            StepStatus::Done
        } else {
            StepStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryActor;
    use kestrel_world::ActorRng;
    use rand::SeedableRng;

    fn advance(
        step: &mut Box<dyn Step>,
        actor: &MemoryActor,
        rng: &mut ActorRng,
        elapsed: u64,
    ) -> StepStatus {
        let mut ctx = StepContext::new(actor, rng, elapsed);
        step.advance(&mut ctx)
    }

    #[test]
    fn test_say_is_done_immediately() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(1);
        let mut step = Say::new("Hello").start();

        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Done);
        assert_eq!(actor.said(), vec!["Hello".to_string()]);
    }

    #[test]
    fn test_say_random_phrase_uses_list() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(7);
        let action = SayRandomPhrase::new(["a", "b", "c"]);

        for _ in 0..20 {
            let mut step = action.start();
            assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Done);
        }
        let said = actor.said();
        assert_eq!(said.len(), 20);
        assert!(said.iter().all(|p| ["a", "b", "c"].contains(&p.as_str())));
    }

    #[test]
    fn test_say_random_phrase_empty_says_nothing() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(7);
        let mut step = SayRandomPhrase::new(Vec::<String>::new()).start();

        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Done);
        assert!(actor.said().is_empty());
    }

    #[test]
    fn test_wait_exact_reaches_target() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(1);
        let mut step = Wait::new(10, 10).start();

        for elapsed in [0, 3, 9] {
            assert_eq!(advance(&mut step, &actor, &mut rng, elapsed), StepStatus::Pending);
        }
        assert_eq!(advance(&mut step, &actor, &mut rng, 10), StepStatus::Done);
    }

    #[test]
    fn test_wait_independent_of_tick_granularity() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(1);
        let mut step = Wait::exactly(10).start();

        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Pending);
        // One coarse tick jumping past the target still completes
        assert_eq!(advance(&mut step, &actor, &mut rng, 500), StepStatus::Done);
    }

    #[test]
    fn test_wait_target_within_range_and_fixed_once() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(99);

        for _ in 0..50 {
            let mut step = Wait::new(100, 200).start();
            assert_eq!(advance(&mut step, &actor, &mut rng, 1000), StepStatus::Pending);
            let mut finished_at = None;
            for elapsed in 1001..=1200 {
                if advance(&mut step, &actor, &mut rng, elapsed).is_done() {
                    finished_at = Some(elapsed);
                    break;
                }
            }
            let finished_at = finished_at.expect("wait never finished");
            assert!((1100..=1200).contains(&finished_at));
        }
    }

    #[test]
    fn test_unbounded_durations_never_expire_early() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(1);

        let mut forever = Wait::new(10, u64::MAX).start();
        assert_eq!(advance(&mut forever, &actor, &mut rng, 500), StepStatus::Pending);
        assert_eq!(advance(&mut forever, &actor, &mut rng, 1_000_000), StepStatus::Pending);

        // The inner wait decides when this finishes
        let mut step = Timeout::new(u64::MAX, Wait::exactly(10)).start();
        assert_eq!(advance(&mut step, &actor, &mut rng, 500), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 505), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 510), StepStatus::Done);
    }

    #[test]
    fn test_wait_corrects_inverted_range() {
        let wait = Wait::new(300, 100);
        assert_eq!(wait.min_ms, 300);
        assert_eq!(wait.max_ms, 300);
    }

    #[test]
    fn test_wander_fixed_distance() {
        let start = Position::new(5000, 5000);
        let mut rng = ActorRng::seed_from_u64(3);

        for _ in 0..25 {
            let actor = MemoryActor::new(1, start);
            let mut step = Wander::new(400, 400).start();
            assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Pending);

            let moves = actor.moves();
            assert_eq!(moves.len(), 1);
            assert!((start.distance(&moves[0]) - 400.0).abs() <= 1.0);
        }
    }

    #[test]
    fn test_wander_corrects_inverted_range() {
        let wander = Wander::new(500, 100);
        assert_eq!(wander.min_distance(), 500);
        assert_eq!(wander.max_distance(), 500);
    }

    #[test]
    fn test_wander_issues_single_move_until_arrival() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(11);
        let mut step = Wander::new(100, 300).start();

        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 50), StepStatus::Pending);
        assert_eq!(actor.moves().len(), 1);

        let destination = actor.moves()[0];
        let distance = Position::new(0, 0).distance(&destination);
        assert!((99.0..=301.0).contains(&distance));

        actor.teleport(destination);
        assert_eq!(advance(&mut step, &actor, &mut rng, 100), StepStatus::Done);
        assert_eq!(actor.moves().len(), 1);
    }

    #[test]
    fn test_timeout_cuts_long_inner() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(1);
        let mut step = Timeout::new(100, Wait::exactly(1000)).start();

        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 99), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 100), StepStatus::Done);
    }

    #[test]
    fn test_timeout_finishes_with_inner() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(1);
        let mut step = Timeout::new(1000, Wait::exactly(30)).start();

        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 29), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 30), StepStatus::Done);
    }

    #[test]
    fn test_timeout_aborts_wander() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(5);
        let mut step = Timeout::new(200, Wander::new(1000, 1000)).start();

        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 200), StepStatus::Done);
        assert_eq!(actor.moves().len(), 1);
    }

    #[test]
    fn test_sequence_runs_children_in_order() {
        let actor = MemoryActor::new(1, Position::new(0, 0));
        let mut rng = ActorRng::seed_from_u64(1);
        let mut step = Sequence::new()
            .then(Say::new("one"))
            .then(Wait::exactly(10))
            .then(Say::new("two"))
            .start();

        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Pending);
        assert_eq!(actor.said(), vec!["one".to_string()]);
        assert_eq!(advance(&mut step, &actor, &mut rng, 0), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 10), StepStatus::Pending);
        assert_eq!(advance(&mut step, &actor, &mut rng, 10), StepStatus::Done);
        assert_eq!(actor.said(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let run = |seed: u64| {
            let actor = MemoryActor::new(1, Position::new(0, 0));
            let mut rng = ActorRng::seed_from_u64(seed);
            let mut step = Sequence::new()
                .then(Wander::new(100, 900))
                .then(Wait::new(0, 5000))
                .start();
            advance(&mut step, &actor, &mut rng, 0);
            actor.teleport(actor.moves()[0]);
            advance(&mut step, &actor, &mut rng, 0);
            let mut elapsed = 0;
            while !advance(&mut step, &actor, &mut rng, elapsed).is_done() {
                elapsed += 50;
            }
            (actor.moves(), elapsed)
        };

        assert_eq!(run(1234), run(1234));
    }
}
