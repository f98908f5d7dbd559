#![forbid(unsafe_code)]

use super::Board;
use crate::error::BoardError;
use crate::notice::Operation;
use crate::remap::Identity;
use crate::remote::TaskFields;
use kb_core::ids::{ColumnKey, TaskId};
use tracing::{debug, info, warn};

impl Board {
    /// Reassigns a task's column in memory only. Unknown ids are ignored.
    pub fn move_task_local(&self, id: &TaskId, status: &ColumnKey) {
        self.mutate(|state| {
            if let Some(index) = self.position_of(&state.tasks, id) {
                state.tasks[index].status = status.clone();
            }
        });
    }

    /// Moves a task and persists the move.
    ///
    /// A task that is still being created is awaited (bounded by
    /// `BoardConfig::identity_wait`) so the update targets the durable row. The move
    /// is recorded in the override cache whether or not the remote accepts it; a
    /// rejected write yields `Ok(false)` and a degraded notice instead of an error.
    pub async fn move_task_persist(
        &self,
        id: &TaskId,
        status: &ColumnKey,
    ) -> Result<bool, BoardError> {
        let owner = self.require_principal()?;
        self.require_column(status)?;

        let current_id = self
            .mutate(|state| {
                let index = self.position_of(&state.tasks, id)?;
                state.tasks[index].status = status.clone();
                Some(state.tasks[index].id.clone())
            })
            .ok_or_else(|| BoardError::validation(format!("unknown task: {id}")))?;

        let target = match self.durable_identity(&current_id).await {
            Identity::Durable(target) => target,
            Identity::Unresolved(best_known) => {
                warn!(task_id = %best_known, "durable id not known in time; persisting with best-known id");
                best_known
            }
            Identity::Abandoned => {
                debug!(task_id = %current_id, "creation failed before move could persist");
                return Ok(false);
            }
        };

        let outcome = self
            .bounded(
                self.remote
                    .update_task(&owner, target.as_str(), &TaskFields::status(status)),
            )
            .await;

        self.with_cache("write override", |cache| {
            cache.set_status(&target, status.as_str())
        });

        match outcome {
            Ok(_) => {
                info!(task_id = %target, status = %status, "task moved");
                Ok(true)
            }
            Err(err) => {
                self.persistence_failed(Operation::MoveTask, &err, true);
                Ok(false)
            }
        }
    }

    /// Drops the cached override for a task so the remote value shows on next reload.
    pub fn clear_override(&self, id: &TaskId) -> bool {
        let target = self.identities.resolve(id);
        self.with_cache("clear override", |cache| cache.clear(&target))
            .unwrap_or(false)
    }
}
