#![forbid(unsafe_code)]

//! Remote record store boundary.
//!
//! The authoritative store holds two collections, tasks and columns. Every call is
//! scoped to the owning principal and may fail; the board treats failures as
//! non-fatal and reconciles locally.

mod memory;

pub use memory::{MemoryRecordStore, RemoteOp};

use async_trait::async_trait;
use kb_core::ids::{ColumnKey, PrincipalId, TaskId};
use kb_core::model::{Column, Task};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteError {
    Unavailable(String),
    Rejected(String),
    NotFound,
    Timeout,
    Malformed(&'static str),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "remote unavailable: {message}"),
            Self::Rejected(message) => write!(f, "remote rejected write: {message}"),
            Self::NotFound => write!(f, "remote record not found"),
            Self::Timeout => write!(f, "remote call timed out"),
            Self::Malformed(message) => write!(f, "malformed remote record: {message}"),
        }
    }
}

impl std::error::Error for RemoteError {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at_ms: i64,
    pub owner_id: String,
}

impl TaskRecord {
    pub fn into_task(self) -> Result<Task, RemoteError> {
        Ok(Task {
            id: TaskId::durable(self.id).map_err(|err| RemoteError::Malformed(err.message()))?,
            title: self.title,
            description: self.description,
            status: ColumnKey::try_new(self.status)
                .map_err(|err| RemoteError::Malformed(err.message()))?,
            created_at_ms: self.created_at_ms,
            owner_id: PrincipalId::try_new(self.owner_id)
                .map_err(|err| RemoteError::Malformed(err.message()))?,
        })
    }
}

/// Insert payload; the store assigns the durable id and stamps the owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaskRecord {
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at_ms: i64,
}

impl From<&Task> for NewTaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            created_at_ms: task.created_at_ms,
        }
    }
}

/// Partial update; absent fields are left untouched by the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TaskFields {
    pub fn status(status: &ColumnKey) -> Self {
        Self {
            status: Some(status.as_str().to_string()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TaskFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_column(key: &ColumnKey) -> Self {
        Self {
            status: Some(key.as_str().to_string()),
        }
    }

    pub fn matches(&self, record: &TaskRecord) -> bool {
        self.status
            .as_deref()
            .is_none_or(|status| record.status == status)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub key: String,
    pub label: String,
    pub position: i64,
    pub owner_id: String,
}

impl ColumnRecord {
    pub fn into_column(self) -> Result<Column, RemoteError> {
        Ok(Column {
            key: ColumnKey::try_new(self.key).map_err(|err| RemoteError::Malformed(err.message()))?,
            label: self.label,
            position: self.position,
            owner_id: PrincipalId::try_new(self.owner_id)
                .map_err(|err| RemoteError::Malformed(err.message()))?,
        })
    }
}

impl From<&Column> for ColumnRecord {
    fn from(column: &Column) -> Self {
        Self {
            key: column.key.as_str().to_string(),
            label: column.label.clone(),
            position: column.position,
            owner_id: column.owner_id.as_str().to_string(),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Tasks matching `filter`, ordered by creation time ascending.
    async fn select_tasks(
        &self,
        owner: &PrincipalId,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskRecord>, RemoteError>;

    async fn insert_task(
        &self,
        owner: &PrincipalId,
        record: &NewTaskRecord,
    ) -> Result<TaskRecord, RemoteError>;

    async fn update_task(
        &self,
        owner: &PrincipalId,
        id: &str,
        fields: &TaskFields,
    ) -> Result<TaskRecord, RemoteError>;

    async fn delete_task(&self, owner: &PrincipalId, id: &str) -> Result<(), RemoteError>;

    /// Deletes every task matching `filter` and reports how many were removed.
    async fn delete_tasks(
        &self,
        owner: &PrincipalId,
        filter: &TaskFilter,
    ) -> Result<usize, RemoteError>;

    /// Columns ordered by position ascending.
    async fn select_columns(&self, owner: &PrincipalId) -> Result<Vec<ColumnRecord>, RemoteError>;

    async fn insert_columns(
        &self,
        owner: &PrincipalId,
        records: &[ColumnRecord],
    ) -> Result<Vec<ColumnRecord>, RemoteError>;

    async fn delete_column(&self, owner: &PrincipalId, key: &str) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_update_sends_only_the_status_field() {
        let key = ColumnKey::try_new("done").unwrap();
        let json = serde_json::to_value(TaskFields::status(&key)).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "done" }));
    }

    #[test]
    fn record_with_invalid_status_is_malformed() {
        let record: TaskRecord = serde_json::from_value(serde_json::json!({
            "id": "task-1",
            "title": "t",
            "description": "",
            "status": "Not A Key",
            "created_at_ms": 1,
            "owner_id": "user-1",
        }))
        .unwrap();
        assert!(matches!(record.into_task(), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn filter_matches_by_status() {
        let record = TaskRecord {
            id: "task-1".to_string(),
            title: "t".to_string(),
            description: String::new(),
            status: "todo".to_string(),
            created_at_ms: 1,
            owner_id: "user-1".to_string(),
        };
        assert!(TaskFilter::all().matches(&record));
        assert!(TaskFilter::in_column(&ColumnKey::try_new("todo").unwrap()).matches(&record));
        assert!(!TaskFilter::in_column(&ColumnKey::try_new("done").unwrap()).matches(&record));
    }
}
