#![forbid(unsafe_code)]

//! Durable override cache.
//!
//! Field-level overrides keyed by task id that outlive the in-memory board. An
//! override wins over whatever the remote store reports until it is cleared.

mod error;
mod memory;
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryOverrideCache;
pub use sqlite::SqliteOverrideCache;

use kb_core::ids::TaskId;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Overridden task fields. Only `status` is tracked today.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl FieldOverrides {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
    }
}

/// Last-write-wins map from task id to field overrides. One owner per instance.
pub trait OverrideCache: Send {
    fn get(&self, task_id: &TaskId) -> Result<Option<FieldOverrides>, StoreError>;

    fn put(&mut self, task_id: &TaskId, overrides: &FieldOverrides) -> Result<(), StoreError>;

    fn clear(&mut self, task_id: &TaskId) -> Result<bool, StoreError>;

    /// Moves the record stored under `from` to `to`, replacing any record at `to`.
    fn rename(&mut self, from: &TaskId, to: &TaskId) -> Result<bool, StoreError>;

    fn status(&self, task_id: &TaskId) -> Result<Option<String>, StoreError> {
        Ok(self.get(task_id)?.and_then(|overrides| overrides.status))
    }

    fn set_status(&mut self, task_id: &TaskId, status: &str) -> Result<(), StoreError> {
        let mut overrides = self.get(task_id)?.unwrap_or_default();
        overrides.status = Some(status.to_string());
        self.put(task_id, &overrides)
    }
}

fn id_kind(task_id: &TaskId) -> &'static str {
    match task_id {
        TaskId::Temporary(_) => "temporary",
        TaskId::Durable(_) => "durable",
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(i64::MAX as u128) as i64
}
