#![forbid(unsafe_code)]

//! In-process record store with failure injection.
//!
//! Behaves like the authoritative store (durable id assignment, owner scoping,
//! creation ordering) and lets callers make individual operations fail or stall.

use super::{
    ColumnRecord, NewTaskRecord, RecordStore, RemoteError, TaskFields, TaskFilter, TaskRecord,
};
use async_trait::async_trait;
use kb_core::ids::PrincipalId;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemoteOp {
    SelectTasks,
    InsertTask,
    UpdateTask,
    DeleteTask,
    DeleteTasks,
    SelectColumns,
    InsertColumns,
    DeleteColumn,
}

#[derive(Debug, Default)]
struct Tables {
    tasks: Vec<TaskRecord>,
    columns: Vec<ColumnRecord>,
    next_task_seq: u64,
}

#[derive(Debug, Default)]
struct Faults {
    /// Remaining single-shot failures per operation.
    fail_next: HashMap<RemoteOp, usize>,
    fail_always: HashSet<RemoteOp>,
    latency: HashMap<RemoteOp, Duration>,
    calls: HashMap<RemoteOp, u64>,
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `op` call fail. Repeated calls stack.
    pub fn fail_next(&self, op: RemoteOp) {
        *lock(&self.faults).fail_next.entry(op).or_default() += 1;
    }

    pub fn fail_always(&self, op: RemoteOp) {
        lock(&self.faults).fail_always.insert(op);
    }

    pub fn heal(&self, op: RemoteOp) {
        let mut faults = lock(&self.faults);
        faults.fail_always.remove(&op);
        faults.fail_next.remove(&op);
    }

    pub fn set_latency(&self, op: RemoteOp, latency: Duration) {
        lock(&self.faults).latency.insert(op, latency);
    }

    pub fn calls(&self, op: RemoteOp) -> u64 {
        lock(&self.faults).calls.get(&op).copied().unwrap_or(0)
    }

    pub fn task_records(&self, owner: &PrincipalId) -> Vec<TaskRecord> {
        lock(&self.tables)
            .tasks
            .iter()
            .filter(|record| record.owner_id == owner.as_str())
            .cloned()
            .collect()
    }

    pub fn column_records(&self, owner: &PrincipalId) -> Vec<ColumnRecord> {
        lock(&self.tables)
            .columns
            .iter()
            .filter(|record| record.owner_id == owner.as_str())
            .cloned()
            .collect()
    }

    /// Rewrites a stored status behind the board's back, as another writer would.
    pub fn force_task_status(&self, id: &str, status: &str) -> bool {
        let mut tables = lock(&self.tables);
        match tables.tasks.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.status = status.to_string();
                true
            }
            None => false,
        }
    }

    /// Runs the fault schedule for `op`: records the call, sleeps for the configured
    /// latency, then fails if a fault is armed.
    async fn enter(&self, op: RemoteOp) -> Result<(), RemoteError> {
        let latency = {
            let mut faults = lock(&self.faults);
            *faults.calls.entry(op).or_default() += 1;
            faults.latency.get(&op).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut faults = lock(&self.faults);
        if faults.fail_always.contains(&op) {
            return Err(RemoteError::Unavailable(format!("injected failure: {op:?}")));
        }
        if let Some(remaining) = faults.fail_next.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Unavailable(format!("injected failure: {op:?}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn select_tasks(
        &self,
        owner: &PrincipalId,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskRecord>, RemoteError> {
        self.enter(RemoteOp::SelectTasks).await?;
        let tables = lock(&self.tables);
        let mut out = tables
            .tasks
            .iter()
            .filter(|record| record.owner_id == owner.as_str() && filter.matches(record))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms));
        Ok(out)
    }

    async fn insert_task(
        &self,
        owner: &PrincipalId,
        record: &NewTaskRecord,
    ) -> Result<TaskRecord, RemoteError> {
        self.enter(RemoteOp::InsertTask).await?;
        if record.title.trim().is_empty() {
            return Err(RemoteError::Rejected("title must not be empty".to_string()));
        }
        let mut tables = lock(&self.tables);
        tables.next_task_seq += 1;
        let stored = TaskRecord {
            id: format!("task-{}", tables.next_task_seq),
            title: record.title.clone(),
            description: record.description.clone(),
            status: record.status.clone(),
            created_at_ms: record.created_at_ms,
            owner_id: owner.as_str().to_string(),
        };
        tables.tasks.push(stored.clone());
        Ok(stored)
    }

    async fn update_task(
        &self,
        owner: &PrincipalId,
        id: &str,
        fields: &TaskFields,
    ) -> Result<TaskRecord, RemoteError> {
        self.enter(RemoteOp::UpdateTask).await?;
        let mut tables = lock(&self.tables);
        let record = tables
            .tasks
            .iter_mut()
            .find(|record| record.id == id && record.owner_id == owner.as_str())
            .ok_or(RemoteError::NotFound)?;
        if let Some(title) = &fields.title {
            record.title = title.clone();
        }
        if let Some(description) = &fields.description {
            record.description = description.clone();
        }
        if let Some(status) = &fields.status {
            record.status = status.clone();
        }
        Ok(record.clone())
    }

    async fn delete_task(&self, owner: &PrincipalId, id: &str) -> Result<(), RemoteError> {
        self.enter(RemoteOp::DeleteTask).await?;
        let mut tables = lock(&self.tables);
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|record| !(record.id == id && record.owner_id == owner.as_str()));
        if tables.tasks.len() == before {
            return Err(RemoteError::NotFound);
        }
        Ok(())
    }

    async fn delete_tasks(
        &self,
        owner: &PrincipalId,
        filter: &TaskFilter,
    ) -> Result<usize, RemoteError> {
        self.enter(RemoteOp::DeleteTasks).await?;
        let mut tables = lock(&self.tables);
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|record| !(record.owner_id == owner.as_str() && filter.matches(record)));
        Ok(before - tables.tasks.len())
    }

    async fn select_columns(&self, owner: &PrincipalId) -> Result<Vec<ColumnRecord>, RemoteError> {
        self.enter(RemoteOp::SelectColumns).await?;
        let mut out = self.column_records(owner);
        out.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.key.cmp(&b.key)));
        Ok(out)
    }

    async fn insert_columns(
        &self,
        owner: &PrincipalId,
        records: &[ColumnRecord],
    ) -> Result<Vec<ColumnRecord>, RemoteError> {
        self.enter(RemoteOp::InsertColumns).await?;
        let mut tables = lock(&self.tables);
        for record in records {
            let exists = tables
                .columns
                .iter()
                .any(|column| column.owner_id == owner.as_str() && column.key == record.key);
            if exists {
                return Err(RemoteError::Rejected(format!(
                    "duplicate column key {}",
                    record.key
                )));
            }
        }
        let inserted = records
            .iter()
            .map(|record| ColumnRecord {
                owner_id: owner.as_str().to_string(),
                ..record.clone()
            })
            .collect::<Vec<_>>();
        tables.columns.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn delete_column(&self, owner: &PrincipalId, key: &str) -> Result<(), RemoteError> {
        self.enter(RemoteOp::DeleteColumn).await?;
        let mut tables = lock(&self.tables);
        let before = tables.columns.len();
        tables
            .columns
            .retain(|column| !(column.key == key && column.owner_id == owner.as_str()));
        if tables.columns.len() == before {
            return Err(RemoteError::NotFound);
        }
        Ok(())
    }
}
