use std::sync::Mutex;

use kestrel_world::{Actor, EntityId, Position};

use crate::lock;

/// In-memory [`Actor`] used by the sandbox server and by tests.
///
/// Records every `say` and `move_to`. Moves either complete instantly or
/// wait for [`MemoryActor::teleport`] / [`MemoryActor::walk`] to carry the
/// actor there.
pub struct MemoryActor {
    id: EntityId,
    instant_moves: bool,
    state: Mutex<MemoryActorState>,
}

#[derive(Default)]
struct MemoryActorState {
    position: Position,
    observer_nearby: bool,
    destination: Option<Position>,
    said: Vec<String>,
    moves: Vec<Position>,
}

impl MemoryActor {
    pub fn new(id: u64, position: Position) -> Self {
        Self {
            id: EntityId(id),
            instant_moves: false,
            state: Mutex::new(MemoryActorState {
                position,
                observer_nearby: true,
                ..Default::default()
            }),
        }
    }

    /// Moves arrive as soon as they are issued
    pub fn with_instant_moves(mut self) -> Self {
        self.instant_moves = true;
        self
    }

    pub fn set_observer_nearby(&self, nearby: bool) {
        lock(&self.state).observer_nearby = nearby;
    }

    pub fn teleport(&self, position: Position) {
        lock(&self.state).position = position;
    }

    /// Move up to `speed` units towards the pending destination
    pub fn walk(&self, speed: f64) {
        let mut state = lock(&self.state);
        let Some(destination) = state.destination else {
            return;
        };
        let remaining = state.position.distance(&destination);
        if remaining <= speed {
            state.position = destination;
            state.destination = None;
        } else {
            let dx = f64::from(destination.x - state.position.x);
            let dy = f64::from(destination.y - state.position.y);
            let angle = dy.atan2(dx);
            state.position = state.position.offset_polar(angle, speed);
        }
    }

    pub fn said(&self) -> Vec<String> {
        lock(&self.state).said.clone()
    }

    pub fn moves(&self) -> Vec<Position> {
        lock(&self.state).moves.clone()
    }
}

impl Actor for MemoryActor {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Position {
        lock(&self.state).position
    }

    fn has_observer_nearby(&self) -> bool {
        lock(&self.state).observer_nearby
    }

    fn move_to(&self, destination: Position) {
        let mut state = lock(&self.state);
        state.moves.push(destination);
        if self.instant_moves {
            state.position = destination;
            state.destination = None;
        } else {
            state.destination = Some(destination);
        }
    }

    fn say(&self, message: &str) {
        lock(&self.state).said.push(message.to_string());
    }
}
