use std::sync::Arc;

use kestrel_scripting_host::{BehaviorRegistry, HookRegistry};
use kestrel_world::config::KestrelConfig;

use crate::event_bus::EventBus;
use crate::npc_directory::NpcDirectory;
use crate::penalty::Penalty;

/// Server-wide subsystems, handed to every connection explicitly
pub struct ServerContext {
    pub config: KestrelConfig,
    pub behaviors: Arc<BehaviorRegistry>,
    pub npcs: NpcDirectory,
    pub hooks: Arc<HookRegistry>,
    pub penalty: Arc<dyn Penalty>,
    pub event_bus: EventBus,
}
