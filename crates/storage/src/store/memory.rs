#![forbid(unsafe_code)]

use super::{FieldOverrides, OverrideCache, StoreError, id_kind};
use kb_core::ids::TaskId;
use std::collections::BTreeMap;

/// Process-local cache. Survives board reloads within one process only.
#[derive(Debug, Default)]
pub struct MemoryOverrideCache {
    entries: BTreeMap<(&'static str, String), FieldOverrides>,
}

impl MemoryOverrideCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry_key(task_id: &TaskId) -> (&'static str, String) {
    (id_kind(task_id), task_id.as_str().to_string())
}

impl OverrideCache for MemoryOverrideCache {
    fn get(&self, task_id: &TaskId) -> Result<Option<FieldOverrides>, StoreError> {
        Ok(self.entries.get(&entry_key(task_id)).cloned())
    }

    fn put(&mut self, task_id: &TaskId, overrides: &FieldOverrides) -> Result<(), StoreError> {
        if overrides.is_empty() {
            self.entries.remove(&entry_key(task_id));
            return Ok(());
        }
        self.entries.insert(entry_key(task_id), overrides.clone());
        Ok(())
    }

    fn clear(&mut self, task_id: &TaskId) -> Result<bool, StoreError> {
        Ok(self.entries.remove(&entry_key(task_id)).is_some())
    }

    fn rename(&mut self, from: &TaskId, to: &TaskId) -> Result<bool, StoreError> {
        let Some(overrides) = self.entries.remove(&entry_key(from)) else {
            return Ok(false);
        };
        self.entries.insert(entry_key(to), overrides);
        Ok(true)
    }
}
