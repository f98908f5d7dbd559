#![forbid(unsafe_code)]

use kb_core::ids::TaskId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Signal {
    Pending,
    Confirmed(TaskId),
    Abandoned,
}

/// Result of waiting for a task's durable identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Identity {
    Durable(TaskId),
    /// Creation failed; the task never existed remotely.
    Abandoned,
    /// No durable id within the wait window; carries the best-known id.
    Unresolved(TaskId),
}

#[derive(Debug, Default)]
struct RemapState {
    confirmed: HashMap<TaskId, TaskId>,
    pending: HashMap<TaskId, watch::Sender<Signal>>,
}

/// Maps temporary task ids to the durable ids assigned by the remote store.
///
/// Each optimistic creation registers a completion signal that is resolved exactly
/// once, either with the durable id or as abandoned.
#[derive(Debug, Default)]
pub(crate) struct IdentityRemapper {
    state: Mutex<RemapState>,
}

impl IdentityRemapper {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RemapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn begin(&self, temp_id: &TaskId) {
        let (tx, _rx) = watch::channel(Signal::Pending);
        self.state().pending.insert(temp_id.clone(), tx);
    }

    /// One-shot: a temporary id that is already mapped keeps its first mapping.
    pub(crate) fn record(&self, temp_id: &TaskId, durable_id: &TaskId) -> bool {
        let mut state = self.state();
        if state.confirmed.contains_key(temp_id) {
            return false;
        }
        state.confirmed.insert(temp_id.clone(), durable_id.clone());
        if let Some(tx) = state.pending.remove(temp_id) {
            tx.send_replace(Signal::Confirmed(durable_id.clone()));
        }
        true
    }

    pub(crate) fn abandon(&self, temp_id: &TaskId) {
        if let Some(tx) = self.state().pending.remove(temp_id) {
            tx.send_replace(Signal::Abandoned);
        }
    }

    pub(crate) fn resolve(&self, id: &TaskId) -> TaskId {
        self.state()
            .confirmed
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.clone())
    }

    pub(crate) fn is_pending(&self, id: &TaskId) -> bool {
        self.state().pending.contains_key(id)
    }

    /// Drops every mapping that references `id` on either side.
    pub(crate) fn forget(&self, id: &TaskId) {
        let mut state = self.state();
        state
            .confirmed
            .retain(|temp, durable| temp != id && durable != id);
        state.pending.remove(id);
    }

    /// Waits up to `limit` for `id` to become durable.
    pub(crate) async fn wait_durable(&self, id: &TaskId, limit: Duration) -> Identity {
        let mut rx = {
            let state = self.state();
            if id.is_durable() {
                return Identity::Durable(id.clone());
            }
            if let Some(durable) = state.confirmed.get(id) {
                return Identity::Durable(durable.clone());
            }
            match state.pending.get(id) {
                Some(tx) => tx.subscribe(),
                None => return Identity::Unresolved(id.clone()),
            }
        };

        let outcome = tokio::time::timeout(limit, async {
            rx.wait_for(|signal| *signal != Signal::Pending)
                .await
                .map(|signal| signal.clone())
        })
        .await;

        match outcome {
            Ok(Ok(Signal::Confirmed(durable))) => Identity::Durable(durable),
            Ok(Ok(Signal::Abandoned)) => Identity::Abandoned,
            // The sender only goes away after resolving, so a closed channel means
            // the mapping table is authoritative.
            Ok(Ok(Signal::Pending)) | Ok(Err(_)) => match self.state().confirmed.get(id) {
                Some(durable) => Identity::Durable(durable.clone()),
                None => Identity::Abandoned,
            },
            Err(_) => Identity::Unresolved(self.resolve(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp(id: &str) -> TaskId {
        TaskId::temporary(id).unwrap()
    }

    fn durable(id: &str) -> TaskId {
        TaskId::durable(id).unwrap()
    }

    #[test]
    fn resolve_passes_unmapped_ids_through() {
        let remapper = IdentityRemapper::new();
        assert_eq!(remapper.resolve(&temp("a")), temp("a"));
        assert_eq!(remapper.resolve(&durable("a")), durable("a"));
    }

    #[test]
    fn record_is_one_shot() {
        let remapper = IdentityRemapper::new();
        remapper.begin(&temp("a"));
        assert!(remapper.record(&temp("a"), &durable("task-1")));
        assert!(!remapper.record(&temp("a"), &durable("task-2")));
        assert_eq!(remapper.resolve(&temp("a")), durable("task-1"));
        assert!(!remapper.is_pending(&temp("a")));
    }

    #[test]
    fn forget_drops_both_directions() {
        let remapper = IdentityRemapper::new();
        remapper.record(&temp("a"), &durable("task-1"));
        remapper.record(&temp("b"), &durable("task-2"));
        remapper.forget(&durable("task-1"));
        remapper.forget(&temp("b"));
        assert_eq!(remapper.resolve(&temp("a")), temp("a"));
        assert_eq!(remapper.resolve(&temp("b")), temp("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_wakes_on_confirmation() {
        let remapper = IdentityRemapper::new();
        let id = temp("a");
        remapper.begin(&id);
        let (identity, ()) = tokio::join!(
            remapper.wait_durable(&id, Duration::from_secs(1)),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                remapper.record(&id, &durable("task-1"));
            }
        );
        assert_eq!(identity, Identity::Durable(durable("task-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_sees_abandonment() {
        let remapper = IdentityRemapper::new();
        let id = temp("a");
        remapper.begin(&id);
        let (identity, ()) = tokio::join!(
            remapper.wait_durable(&id, Duration::from_secs(1)),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                remapper.abandon(&id);
            }
        );
        assert_eq!(identity, Identity::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_times_out_with_best_known_id() {
        let remapper = IdentityRemapper::new();
        remapper.begin(&temp("a"));
        let identity = remapper
            .wait_durable(&temp("a"), Duration::from_millis(300))
            .await;
        assert_eq!(identity, Identity::Unresolved(temp("a")));
        assert!(remapper.is_pending(&temp("a")));
    }

    #[tokio::test]
    async fn already_resolved_ids_return_immediately() {
        let remapper = IdentityRemapper::new();
        remapper.record(&temp("a"), &durable("task-1"));
        assert_eq!(
            remapper.wait_durable(&temp("a"), Duration::ZERO).await,
            Identity::Durable(durable("task-1"))
        );
        assert_eq!(
            remapper.wait_durable(&durable("x"), Duration::ZERO).await,
            Identity::Durable(durable("x"))
        );
    }
}
