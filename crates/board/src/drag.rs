#![forbid(unsafe_code)]

//! Drag gesture handling.
//!
//! Hovering gives free local feedback; only the drop decides whether a move is
//! persisted. Dropping onto a task means "the column that task is in": ordering
//! within a column follows creation order and is never persisted.

use crate::board::Board;
use crate::error::BoardError;
use kb_core::ids::{ColumnKey, TaskId};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragTarget {
    Column(ColumnKey),
    Task(TaskId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging { task_id: TaskId, origin: ColumnKey },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// `gesture_end` without a preceding `gesture_start`.
    NotDragging,
    /// Released outside any column; hover moves stand as they are.
    NoTarget,
    /// Released on the column the gesture started in.
    Unchanged,
    Persisted(ColumnKey),
    /// Kept locally and cached, but the remote rejected the write.
    Degraded(ColumnKey),
}

pub struct DragController {
    board: Arc<Board>,
    state: DragState,
}

impl DragController {
    pub fn new(board: Arc<Board>) -> Self {
        Self {
            board,
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Starts dragging `task_id`. Returns `false` and stays idle for unknown tasks.
    pub fn gesture_start(&mut self, task_id: &TaskId) -> bool {
        let Some(task) = self.board.task(task_id) else {
            return false;
        };
        debug!(task_id = %task.id, origin = %task.status, "drag started");
        self.board.set_dragging(Some(task.id.clone()));
        self.state = DragState::Dragging {
            task_id: task.id,
            origin: task.status,
        };
        true
    }

    /// Applies a local-only move when the pointer enters a different column.
    /// Returns the column the task was moved into, if any.
    pub fn gesture_over(&mut self, target: &DragTarget) -> Option<ColumnKey> {
        let DragState::Dragging { task_id, .. } = &self.state else {
            return None;
        };
        let column = self.target_column(target)?;
        let current = self.board.task(task_id)?;
        if current.status == column {
            return None;
        }
        self.board.move_task_local(task_id, &column);
        Some(column)
    }

    /// Ends the gesture. Persists when the drop column differs from where the drag
    /// started; the dragged marker is cleared in every case.
    pub async fn gesture_end(
        &mut self,
        target: Option<&DragTarget>,
    ) -> Result<DropOutcome, BoardError> {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        self.board.set_dragging(None);
        let DragState::Dragging { task_id, origin } = state else {
            return Ok(DropOutcome::NotDragging);
        };

        let Some(column) = target.and_then(|target| self.target_column(target)) else {
            debug!(task_id = %task_id, "drag ended without a column target");
            return Ok(DropOutcome::NoTarget);
        };
        if column == origin {
            // Dropping counts as hovering the target once more.
            self.board.move_task_local(&task_id, &column);
            return Ok(DropOutcome::Unchanged);
        }

        if self.board.move_task_persist(&task_id, &column).await? {
            Ok(DropOutcome::Persisted(column))
        } else {
            Ok(DropOutcome::Degraded(column))
        }
    }

    fn target_column(&self, target: &DragTarget) -> Option<ColumnKey> {
        match target {
            DragTarget::Column(key) => self.board.has_column(key).then(|| key.clone()),
            DragTarget::Task(id) => self.board.task(id).map(|task| task.status),
        }
    }
}
