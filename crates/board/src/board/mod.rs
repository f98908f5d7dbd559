#![forbid(unsafe_code)]

mod columns;
mod moves;
mod tasks;

use crate::config::BoardConfig;
use crate::error::BoardError;
use crate::notice::{Notice, Operation};
use crate::principal::PrincipalProvider;
use crate::remap::{Identity, IdentityRemapper};
use crate::remote::{RecordStore, RemoteError};
use kb_core::ids::{ColumnKey, PrincipalId, TaskId};
use kb_core::model::{Column, Task};
use kb_storage::OverrideCache;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, watch};
use tracing::warn;

/// Read model handed to the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardSnapshot {
    /// Creation order.
    pub tasks: Vec<Task>,
    /// Position order.
    pub columns: Vec<Column>,
    pub loading: bool,
    pub dragging: Option<TaskId>,
}

impl BoardSnapshot {
    pub fn tasks_in<'a>(&'a self, key: &'a ColumnKey) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |task| &task.status == key)
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&Column> {
        self.columns.iter().find(|column| &column.key == key)
    }

    pub fn has_column(&self, key: &ColumnKey) -> bool {
        self.column(key).is_some()
    }
}

/// The single owner of board state for one session.
///
/// Every mutation follows the same shape: snapshot, optimistic local apply, remote
/// call, then confirm or revert. The state lock is never held across an await, so
/// concurrent operations interleave only at remote calls and identity waits.
pub struct Board {
    remote: Arc<dyn RecordStore>,
    principal: Arc<dyn PrincipalProvider>,
    cache: Mutex<Box<dyn OverrideCache>>,
    identities: IdentityRemapper,
    state: Mutex<BoardSnapshot>,
    snapshots: watch::Sender<BoardSnapshot>,
    notices: broadcast::Sender<Notice>,
    config: BoardConfig,
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("state", &*self.lock_state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(i64::MAX as u128) as i64
}

impl Board {
    pub fn new(
        remote: Arc<dyn RecordStore>,
        principal: Arc<dyn PrincipalProvider>,
        cache: Box<dyn OverrideCache>,
        config: BoardConfig,
    ) -> Self {
        let (snapshots, _) = watch::channel(BoardSnapshot::default());
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        Self {
            remote,
            principal,
            cache: Mutex::new(cache),
            identities: IdentityRemapper::new(),
            state: Mutex::new(BoardSnapshot::default()),
            snapshots,
            notices,
            config,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.lock_state().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock_state().tasks.clone()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.lock_state().columns.clone()
    }

    /// Looks a task up by the id the caller holds, following a temporary id to its
    /// durable replacement once creation has been confirmed.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        let state = self.lock_state();
        self.position_of(&state.tasks, id)
            .map(|index| state.tasks[index].clone())
    }

    pub fn has_column(&self, key: &ColumnKey) -> bool {
        self.lock_state().has_column(key)
    }

    pub fn dragging(&self) -> Option<TaskId> {
        self.lock_state().dragging.clone()
    }

    pub fn set_dragging(&self, id: Option<TaskId>) {
        self.mutate(|state| state.dragging = id);
    }

    fn lock_state(&self) -> MutexGuard<'_, BoardSnapshot> {
        lock(&self.state)
    }

    /// Applies `f` to the board state and publishes the result to subscribers.
    fn mutate<R>(&self, f: impl FnOnce(&mut BoardSnapshot) -> R) -> R {
        let mut state = self.lock_state();
        let out = f(&mut state);
        self.snapshots.send_replace(state.clone());
        out
    }

    fn position_of(&self, tasks: &[Task], id: &TaskId) -> Option<usize> {
        if let Some(index) = tasks.iter().position(|task| &task.id == id) {
            return Some(index);
        }
        let resolved = self.identities.resolve(id);
        if &resolved == id {
            return None;
        }
        tasks.iter().position(|task| task.id == resolved)
    }

    fn require_principal(&self) -> Result<PrincipalId, BoardError> {
        self.principal
            .current_principal_id()
            .ok_or(BoardError::Unauthenticated)
    }

    fn require_column(&self, key: &ColumnKey) -> Result<(), BoardError> {
        let state = self.lock_state();
        if state.columns.is_empty() || state.has_column(key) {
            return Ok(());
        }
        Err(BoardError::validation(format!("unknown column: {key}")))
    }

    async fn durable_identity(&self, id: &TaskId) -> Identity {
        self.identities
            .wait_durable(id, self.config.identity_wait)
            .await
    }

    /// Bounds one remote call by `BoardConfig::remote_timeout`.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        match tokio::time::timeout(self.config.remote_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RemoteError::Timeout),
        }
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine; notices are fire-and-forget.
        let _ = self.notices.send(notice);
    }

    fn saved(&self, operation: Operation) {
        self.notify(Notice::Saved { operation });
    }

    /// Raises the failure notice and builds the matching error.
    fn persistence_failed(
        &self,
        operation: Operation,
        err: &RemoteError,
        degraded: bool,
    ) -> BoardError {
        warn!(operation = %operation, degraded, error = %err, "remote write failed");
        let message = err.to_string();
        self.notify(Notice::PersistenceFailed {
            operation,
            degraded,
            message: message.clone(),
        });
        BoardError::PersistenceFailed { operation, message }
    }

    fn with_cache<R>(
        &self,
        what: &'static str,
        f: impl FnOnce(&mut dyn OverrideCache) -> Result<R, kb_storage::StoreError>,
    ) -> Option<R> {
        let mut cache = lock(&self.cache);
        match f(cache.as_mut()) {
            Ok(out) => Some(out),
            Err(err) => {
                warn!(error = %err, what, "override cache failure");
                None
            }
        }
    }
}
