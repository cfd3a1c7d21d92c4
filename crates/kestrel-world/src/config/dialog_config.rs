use serde::{Deserialize, Serialize};

/// Settings for NPC conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Maximum distance between talker and target when a conversation starts
    pub talk_range: f64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self { talk_range: 1000.0 }
    }
}
