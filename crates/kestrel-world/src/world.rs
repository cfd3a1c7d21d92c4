use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of any world entity (creature, NPC, player character)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Identifier of one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// A point on a region's 2D grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        dx.hypot(dy)
    }

    /// Whether `other` lies within `range` of this position (inclusive)
    pub fn in_range(&self, other: &Position, range: f64) -> bool {
        self.distance(other) <= range
    }

    /// The position `distance` units away along `angle` (radians), snapped to
    /// the grid. Coordinates stop at the edge of the grid.
    pub fn offset_polar(&self, angle: f64, distance: f64) -> Position {
        Position {
            x: clamp_coordinate(f64::from(self.x) + angle.cos() * distance),
            y: clamp_coordinate(f64::from(self.y) + angle.sin() * distance),
        }
    }
}

fn clamp_coordinate(value: f64) -> i32 {
    // `as` saturates out-of-range floats and maps NaN to 0
    value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// What the world layer exposes to behavior routines.
///
/// Implementations live outside this core (region management, movement,
/// visibility). All methods are called from scheduler threads, so the
/// implementation does its own synchronization.
pub trait Actor: Send + Sync {
    fn id(&self) -> EntityId;

    /// Current position
    fn position(&self) -> Position;

    /// Whether any observer (player) is close enough for this actor's
    /// behavior to matter. Drives automatic deactivation.
    fn has_observer_nearby(&self) -> bool;

    /// Issue a move command towards `destination`
    fn move_to(&self, destination: Position);

    /// Whether the actor has reached `destination`
    fn has_arrived(&self, destination: Position) -> bool {
        self.position() == destination
    }

    /// Broadcast a chat line to nearby observers
    fn say(&self, message: &str);
}
