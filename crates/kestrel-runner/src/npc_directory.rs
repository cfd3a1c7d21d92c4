use std::collections::HashMap;
use std::sync::Arc;

use kestrel_scripting_host::DialogTarget;
use kestrel_world::EntityId;

/// NPCs players can talk to, looked up by entity id on `TalkStart`
#[derive(Debug, Default, Clone)]
pub struct NpcDirectory {
    targets: HashMap<EntityId, Arc<DialogTarget>>,
}

impl NpcDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target back if the id is already taken
    pub fn insert(&mut self, target: DialogTarget) -> Result<(), DialogTarget> {
        if self.targets.contains_key(&target.id) {
            return Err(target);
        }
        self.targets.insert(target.id, Arc::new(target));
        Ok(())
    }

    pub fn get(&self, id: EntityId) -> Option<Arc<DialogTarget>> {
        self.targets.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
