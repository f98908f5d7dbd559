#![forbid(unsafe_code)]

use super::{Board, now_ms};
use crate::error::BoardError;
use crate::notice::Operation;
use crate::remap::Identity;
use crate::remote::{NewTaskRecord, RemoteError, TaskFields, TaskFilter, TaskRecord};
use kb_core::ids::{ColumnKey, PrincipalId, TaskId};
use kb_core::model::{PROTECTED_COLUMNS, Task, TaskInput, TaskPatch};
use tracing::{debug, info, warn};
use ulid::Ulid;

fn records_into_tasks(records: Vec<TaskRecord>) -> Vec<Task> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id.clone();
            match record.into_task() {
                Ok(task) => Some(task),
                Err(err) => {
                    warn!(task_id = %id, error = %err, "skipping malformed task record");
                    None
                }
            }
        })
        .collect()
}

impl Board {
    /// Reloads every task of the current principal from the remote store.
    ///
    /// Cached overrides are applied on top of the fetched statuses. Optimistic
    /// entries whose creation is still in flight are kept.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, BoardError> {
        let owner = self.require_principal()?;
        self.mutate(|state| state.loading = true);

        let records = match self
            .bounded(self.remote.select_tasks(&owner, &TaskFilter::all()))
            .await
        {
            Ok(records) => records,
            Err(err) => {
                self.mutate(|state| state.loading = false);
                return Err(self.persistence_failed(Operation::ListTasks, &err, false));
            }
        };

        let mut fetched = records_into_tasks(records);
        self.apply_overrides(&mut fetched);

        let tasks = self.mutate(|state| {
            let in_flight = state
                .tasks
                .iter()
                .filter(|task| task.id.is_temporary() && self.identities.is_pending(&task.id))
                .cloned()
                .collect::<Vec<_>>();
            let mut tasks = fetched;
            tasks.extend(in_flight);
            tasks.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms));
            state.tasks = tasks.clone();
            state.loading = false;
            tasks
        });
        debug!(count = tasks.len(), "tasks reloaded");
        Ok(tasks)
    }

    fn apply_overrides(&self, tasks: &mut [Task]) {
        for task in tasks.iter_mut() {
            let Some(Some(status)) = self.with_cache("read override", |cache| cache.status(&task.id))
            else {
                continue;
            };
            if status == task.status.as_str() {
                continue;
            }
            match ColumnKey::try_new(status) {
                Ok(status) => {
                    debug!(task_id = %task.id, remote = %task.status, local = %status, "override applied");
                    task.status = status;
                }
                Err(err) => warn!(task_id = %task.id, error = err.message(), "ignoring invalid override"),
            }
        }
    }

    /// Creates a task optimistically. The entry is visible under a temporary id until
    /// the remote insert confirms, then replaced by the durable record.
    pub async fn create_task(&self, input: TaskInput) -> Result<Task, BoardError> {
        let owner = self.require_principal()?;
        let input = input.normalized()?;
        let status = match input.status {
            Some(status) => status,
            None => self.first_column_key()?,
        };
        self.require_column(&status)?;

        let temp_id = TaskId::temporary(Ulid::new().to_string())
            .map_err(|err| BoardError::validation(err.message()))?;
        let task = Task {
            id: temp_id.clone(),
            title: input.title,
            description: input.description,
            status,
            created_at_ms: now_ms(),
            owner_id: owner.clone(),
        };

        self.identities.begin(&temp_id);
        self.mutate(|state| state.tasks.push(task.clone()));
        debug!(task_id = %temp_id, status = %task.status, "task created optimistically");

        let confirmed = match self
            .bounded(self.remote.insert_task(&owner, &NewTaskRecord::from(&task)))
            .await
            .and_then(TaskRecord::into_task)
        {
            Ok(confirmed) => confirmed,
            Err(err) => {
                self.identities.abandon(&temp_id);
                self.mutate(|state| state.tasks.retain(|t| t.id != temp_id));
                return Err(self.persistence_failed(Operation::CreateTask, &err, false));
            }
        };

        let created = self.confirm_created(&temp_id, confirmed);
        let orphaned = {
            let state = self.lock_state();
            !state.columns.is_empty() && !state.has_column(&created.status)
        };
        if orphaned {
            return Err(self.discard_orphan(&owner, &temp_id, created).await);
        }
        info!(task_id = %created.id, "task created");
        self.saved(Operation::CreateTask);
        Ok(created)
    }

    /// Swaps the optimistic entry for the confirmed one. Local status wins because
    /// the task may have been moved while the insert was in flight.
    fn confirm_created(&self, temp_id: &TaskId, confirmed: Task) -> Task {
        self.identities.record(temp_id, &confirmed.id);
        if self
            .with_cache("migrate override", |cache| cache.rename(temp_id, &confirmed.id))
            .unwrap_or(false)
        {
            debug!(task_id = %confirmed.id, "override migrated to durable id");
        }

        self.mutate(|state| {
            let Some(temp_index) = state.tasks.iter().position(|t| &t.id == temp_id) else {
                // Deleted locally before confirmation; a pending delete will follow the mapping.
                return confirmed;
            };
            let local_status = state.tasks[temp_index].status.clone();
            let merged = Task {
                status: local_status,
                ..confirmed
            };
            match state.tasks.iter().position(|t| t.id == merged.id) {
                // A reload already brought the durable row in.
                Some(durable_index) => {
                    state.tasks[durable_index] = merged.clone();
                    state.tasks.remove(temp_index);
                }
                None => state.tasks[temp_index] = merged.clone(),
            }
            merged
        })
    }

    /// Undoes a creation whose column was deleted while the insert was in flight.
    async fn discard_orphan(
        &self,
        owner: &PrincipalId,
        temp_id: &TaskId,
        created: Task,
    ) -> BoardError {
        warn!(
            task_id = %created.id,
            column = %created.status,
            "column deleted during creation; discarding task"
        );
        self.mutate(|state| state.tasks.retain(|t| t.id != created.id));
        self.with_cache("clear override", |cache| cache.clear(&created.id));
        self.identities.forget(temp_id);
        self.identities.forget(&created.id);
        match self
            .bounded(self.remote.delete_task(owner, created.id.as_str()))
            .await
        {
            Ok(()) | Err(RemoteError::NotFound) => BoardError::validation(format!(
                "column {} was deleted while the task was being created",
                created.status
            )),
            Err(err) => self.persistence_failed(Operation::CreateTask, &err, false),
        }
    }

    fn first_column_key(&self) -> Result<ColumnKey, BoardError> {
        if let Some(column) = self.lock_state().columns.first() {
            return Ok(column.key.clone());
        }
        Ok(ColumnKey::try_new(PROTECTED_COLUMNS[0].0)?)
    }

    /// Applies `patch` locally, then remotely. A failed remote write restores the
    /// pre-update entry.
    pub async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, BoardError> {
        let owner = self.require_principal()?;
        let patch = patch.normalized()?;
        if let Some(status) = &patch.status {
            self.require_column(status)?;
        }

        let previous = self
            .mutate(|state| {
                let index = self.position_of(&state.tasks, id)?;
                let previous = state.tasks[index].clone();
                patch.apply_to(&mut state.tasks[index]);
                Some(previous)
            })
            .ok_or_else(|| BoardError::validation(format!("unknown task: {id}")))?;
        if patch.is_empty() {
            return Ok(previous);
        }

        let target = match self.durable_identity(&previous.id).await {
            Identity::Durable(target) | Identity::Unresolved(target) => target,
            Identity::Abandoned => {
                return Err(BoardError::PersistenceFailed {
                    operation: Operation::UpdateTask,
                    message: "task was never created remotely".to_string(),
                });
            }
        };

        let fields = TaskFields {
            title: patch.title.clone(),
            description: patch.description.clone(),
            status: patch.status.as_ref().map(|s| s.as_str().to_string()),
        };
        let outcome = self
            .bounded(self.remote.update_task(&owner, target.as_str(), &fields))
            .await
            .and_then(TaskRecord::into_task);

        match outcome {
            Ok(stored) => {
                let updated = self.mutate(|state| {
                    let Some(index) = self.position_of(&state.tasks, &previous.id) else {
                        return stored;
                    };
                    // Without a status in the patch the local column stands; it may be a
                    // cached move the remote never accepted.
                    let updated = match &patch.status {
                        Some(_) => stored,
                        None => Task {
                            status: state.tasks[index].status.clone(),
                            ..stored
                        },
                    };
                    state.tasks[index] = updated.clone();
                    updated
                });
                if let Some(status) = &patch.status {
                    self.sync_override(&updated.id, status);
                }
                info!(task_id = %updated.id, "task updated");
                self.saved(Operation::UpdateTask);
                Ok(updated)
            }
            Err(err) => {
                self.mutate(|state| {
                    if let Some(index) = self.position_of(&state.tasks, &previous.id) {
                        let current = &mut state.tasks[index];
                        current.title = previous.title.clone();
                        current.description = previous.description.clone();
                        current.status = previous.status.clone();
                    }
                });
                Err(self.persistence_failed(Operation::UpdateTask, &err, false))
            }
        }
    }

    /// Keeps an existing override in step with a status the remote just accepted,
    /// so a reload does not resurrect an older move.
    fn sync_override(&self, id: &TaskId, status: &ColumnKey) {
        self.with_cache("sync override", |cache| {
            if cache.status(id)?.is_some() {
                cache.set_status(id, status.as_str())?;
            }
            Ok(())
        });
    }

    /// Removes the task locally right away. A failed remote delete is reported but
    /// never resurrects the task. Returns whether the remote delete was confirmed.
    pub async fn delete_task(&self, id: &TaskId) -> Result<bool, BoardError> {
        let owner = self.require_principal()?;
        let removed = self
            .mutate(|state| {
                let index = self.position_of(&state.tasks, id)?;
                if state.dragging.as_ref() == Some(&state.tasks[index].id) {
                    state.dragging = None;
                }
                Some(state.tasks.remove(index))
            })
            .ok_or_else(|| BoardError::validation(format!("unknown task: {id}")))?;

        let identity = self.durable_identity(&removed.id).await;
        self.with_cache("clear override", |cache| {
            cache.clear(&removed.id)?;
            if let Identity::Durable(target) | Identity::Unresolved(target) = &identity {
                cache.clear(target)?;
            }
            Ok(())
        });

        let confirmed = match &identity {
            Identity::Abandoned => true,
            Identity::Durable(target) | Identity::Unresolved(target) => {
                match self
                    .bounded(self.remote.delete_task(&owner, target.as_str()))
                    .await
                {
                    Ok(()) => {
                        info!(task_id = %target, "task deleted");
                        self.saved(Operation::DeleteTask);
                        true
                    }
                    Err(err) => {
                        self.persistence_failed(Operation::DeleteTask, &err, true);
                        false
                    }
                }
            }
        };

        self.identities.forget(&removed.id);
        if let Identity::Durable(target) = &identity {
            self.identities.forget(target);
        }
        Ok(confirmed)
    }
}
