#![forbid(unsafe_code)]

use super::Board;
use crate::error::BoardError;
use crate::notice::Operation;
use crate::remote::{ColumnRecord, RemoteError, TaskFields, TaskFilter};
use kb_core::ids::{ColumnKey, PrincipalId, TaskId};
use kb_core::model::{Column, default_columns, is_protected_column};
use kb_core::unique_column_key;
use tracing::{debug, info, warn};

fn records_into_columns(records: Vec<ColumnRecord>) -> Vec<Column> {
    let mut columns = records
        .into_iter()
        .filter_map(|record| {
            let key = record.key.clone();
            match record.into_column() {
                Ok(column) => Some(column),
                Err(err) => {
                    warn!(column = %key, error = %err, "skipping malformed column record");
                    None
                }
            }
        })
        .collect::<Vec<_>>();
    columns.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.key.cmp(&b.key)));
    columns
}

impl Board {
    /// Loads the principal's columns. A principal with no columns gets the protected
    /// defaults seeded; an unreachable store yields the defaults without writing.
    /// Without a principal there is nothing to read and the result is empty.
    pub async fn list_columns(&self) -> Result<Vec<Column>, BoardError> {
        let Ok(owner) = self.require_principal() else {
            debug!("no principal; skipping column load");
            return Ok(Vec::new());
        };
        let columns = match self.bounded(self.remote.select_columns(&owner)).await {
            Ok(records) if records.is_empty() => self.seed_default_columns(&owner).await,
            Ok(records) => records_into_columns(records),
            Err(err) => {
                warn!(error = %err, "column store unreachable; using defaults");
                default_columns(&owner)
            }
        };
        self.mutate(|state| state.columns = columns.clone());
        Ok(columns)
    }

    async fn seed_default_columns(&self, owner: &PrincipalId) -> Vec<Column> {
        let defaults = default_columns(owner);
        let records = defaults.iter().map(ColumnRecord::from).collect::<Vec<_>>();
        match self.bounded(self.remote.insert_columns(owner, &records)).await {
            Ok(inserted) => {
                info!(count = inserted.len(), "seeded default columns");
                let seeded = records_into_columns(inserted);
                if seeded.is_empty() { defaults } else { seeded }
            }
            Err(err) => {
                warn!(error = %err, "failed to seed default columns");
                defaults
            }
        }
    }

    pub async fn add_column(&self, label: &str) -> Result<Column, BoardError> {
        let owner = self.require_principal()?;
        let label = label.trim();
        if label.is_empty() {
            return Err(BoardError::validation("column label must not be empty"));
        }

        let column = self.mutate(|state| {
            let key = unique_column_key(label, state.columns.iter().map(|c| &c.key));
            let position = state
                .columns
                .iter()
                .map(|c| c.position)
                .max()
                .map_or(0, |max| max + 1);
            let column = Column {
                key,
                label: label.to_string(),
                position,
                owner_id: owner.clone(),
            };
            state.columns.push(column.clone());
            column
        });
        debug!(column = %column.key, "column added optimistically");

        let inserted = self
            .bounded(
                self.remote
                    .insert_columns(&owner, &[ColumnRecord::from(&column)]),
            )
            .await;
        match inserted {
            Ok(_) => {
                info!(column = %column.key, "column added");
                self.saved(Operation::AddColumn);
                Ok(column)
            }
            Err(err) => {
                self.mutate(|state| state.columns.retain(|c| c.key != column.key));
                Err(self.persistence_failed(Operation::AddColumn, &err, false))
            }
        }
    }

    /// Deletes a column together with its tasks. Tasks go first; if that fails the
    /// column is kept so no task is left pointing at a missing column.
    ///
    /// Membership is what the board shows, not what the remote last stored: tasks
    /// moved out under a cached override survive, tasks moved in are deleted, and
    /// creations still in flight are awaited so their rows are swept too.
    pub async fn delete_column(&self, key: &ColumnKey) -> Result<(), BoardError> {
        if is_protected_column(key) {
            return Err(BoardError::validation(format!(
                "column {key} is protected and cannot be deleted"
            )));
        }
        let owner = self.require_principal()?;
        if !self.lock_state().has_column(key) {
            return Err(BoardError::validation(format!("unknown column: {key}")));
        }

        let pending = self
            .lock_state()
            .tasks_in(key)
            .filter(|task| task.id.is_temporary())
            .map(|task| task.id.clone())
            .collect::<Vec<_>>();
        for id in &pending {
            let identity = self.durable_identity(id).await;
            debug!(task_id = %id, ?identity, "awaited pending creation before cascade");
        }

        let cascaded = self
            .cascade_tasks(&owner, key)
            .await
            .map_err(|err| self.persistence_failed(Operation::DeleteColumn, &err, false))?;

        let removed = self.mutate(|state| {
            let (removed, kept): (Vec<_>, Vec<_>) = state
                .tasks
                .drain(..)
                .partition(|task| &task.status == key);
            state.tasks = kept;
            if state
                .dragging
                .as_ref()
                .is_some_and(|dragging| removed.iter().any(|t| &t.id == dragging))
            {
                state.dragging = None;
            }
            removed
        });
        for task in &removed {
            self.with_cache("clear override", |cache| cache.clear(&task.id));
            self.identities.forget(&task.id);
        }
        debug!(column = %key, remote = cascaded, local = removed.len(), "column tasks removed");

        match self
            .bounded(self.remote.delete_column(&owner, key.as_str()))
            .await
        {
            Ok(()) | Err(RemoteError::NotFound) => {
                self.mutate(|state| state.columns.retain(|c| &c.key != key));
                info!(column = %key, "column deleted");
                self.saved(Operation::DeleteColumn);
                Ok(())
            }
            Err(err) => Err(self.persistence_failed(Operation::DeleteColumn, &err, false)),
        }
    }

    /// Removes the remote rows of every task the board shows in `key`.
    async fn cascade_tasks(
        &self,
        owner: &PrincipalId,
        key: &ColumnKey,
    ) -> Result<usize, RemoteError> {
        let filter = TaskFilter::in_column(key);
        let stored = self.bounded(self.remote.select_tasks(owner, &filter)).await?;

        let (members, moved_out) = {
            let state = self.lock_state();
            let members = state
                .tasks_in(key)
                .map(|task| self.identities.resolve(&task.id))
                .filter(TaskId::is_durable)
                .collect::<Vec<_>>();
            let moved_out = stored
                .iter()
                .filter_map(|record| {
                    let task = state
                        .tasks
                        .iter()
                        .find(|task| task.id.is_durable() && task.id.as_str() == record.id)?;
                    (&task.status != key).then(|| (task.id.clone(), task.status.clone()))
                })
                .collect::<Vec<_>>();
            (members, moved_out)
        };

        for (id, status) in &moved_out {
            self.bounded(
                self.remote
                    .update_task(owner, id.as_str(), &TaskFields::status(status)),
            )
            .await?;
            debug!(task_id = %id, status = %status, "re-persisted task moved out of column");
        }

        let mut removed = 0;
        for id in members
            .iter()
            .filter(|id| !stored.iter().any(|record| record.id == id.as_str()))
        {
            match self.bounded(self.remote.delete_task(owner, id.as_str())).await {
                Ok(()) => removed += 1,
                Err(RemoteError::NotFound) => {}
                Err(err) => return Err(err),
            }
        }

        removed += self.bounded(self.remote.delete_tasks(owner, &filter)).await?;
        Ok(removed)
    }
}
