use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lowest heartbeat any actor may run at, in milliseconds
pub const MIN_HEARTBEAT_MS: u64 = 50;

/// Settings for the per-actor behavior timers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Default tick interval for new behavior instances (default: 500ms)
    pub heartbeat_ms: u64,

    /// Floor applied to every requested interval (default: 50ms)
    pub min_heartbeat_ms: u64,

    /// Actors within this distance of a moving player are woken up
    pub wake_radius: f64,

    /// Fixed seed for the shared seed source, 0 picks one from OS entropy
    pub seed: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: 500,
            min_heartbeat_ms: MIN_HEARTBEAT_MS,
            wake_radius: 3000.0,
            seed: 0,
        }
    }
}

impl SchedulerConfig {
    /// The configured floor, never below 1ms
    pub fn min_interval_ms(&self) -> u64 {
        self.min_heartbeat_ms.max(1)
    }

    /// Apply the configured floor to a requested interval
    pub fn clamp_interval(&self, requested_ms: u64) -> u64 {
        requested_ms.max(self.min_interval_ms())
    }

    /// The default heartbeat, already clamped
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.clamp_interval(self.heartbeat_ms))
    }
}
