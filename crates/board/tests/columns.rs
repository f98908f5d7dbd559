#![forbid(unsafe_code)]

mod support;

use kb_board::{BoardConfig, BoardError, Notice, Operation, RemoteOp, TaskInput};
use std::time::Duration;
use support::{Harness, drain, failures, key};

fn keys(columns: &[kb_board::Column]) -> Vec<&str> {
    columns.iter().map(|c| c.key.as_str()).collect()
}

#[tokio::test]
async fn first_listing_seeds_protected_defaults_once() {
    let h = Harness::new();
    let columns = h.board.list_columns().await.expect("columns");
    assert_eq!(keys(&columns), vec!["todo", "inprogress", "done"]);
    assert_eq!(h.remote.column_records(&h.owner).len(), 3);

    let again = h.board.list_columns().await.expect("columns again");
    assert_eq!(again, columns);
    assert_eq!(h.remote.calls(RemoteOp::InsertColumns), 1);
}

#[tokio::test]
async fn unreachable_store_yields_defaults_without_writing() {
    let h = Harness::new();
    h.remote.fail_next(RemoteOp::SelectColumns);

    let columns = h.board.list_columns().await.expect("columns");
    assert_eq!(keys(&columns), vec!["todo", "inprogress", "done"]);
    assert_eq!(h.remote.calls(RemoteOp::InsertColumns), 0);
    assert!(h.remote.column_records(&h.owner).is_empty());
}

#[tokio::test]
async fn duplicate_labels_get_numeric_suffixes() {
    let h = Harness::new().ready().await;
    let first = h.board.add_column("Backlog").await.expect("first");
    let second = h.board.add_column("Backlog").await.expect("second");
    let third = h.board.add_column(" backlog ").await.expect("third");

    assert_eq!(first.key, key("backlog"));
    assert_eq!(second.key, key("backlog-1"));
    assert_eq!(third.key, key("backlog-2"));
    assert_eq!(first.position, 3);
    assert_eq!(second.position, 4);
    assert_eq!(third.label, "backlog");

    let reloaded = h.reload().list_columns().await.expect("reload");
    assert_eq!(
        keys(&reloaded),
        vec!["todo", "inprogress", "done", "backlog", "backlog-1", "backlog-2"]
    );
}

#[tokio::test]
async fn blank_label_is_rejected() {
    let h = Harness::new().ready().await;
    let err = h.board.add_column("  ").await.expect_err("blank");
    assert!(matches!(err, BoardError::Validation(_)));
    assert_eq!(h.board.columns().len(), 3);
}

#[tokio::test]
async fn failed_column_insert_is_reverted() {
    let h = Harness::new().ready().await;
    let mut notices = h.board.notices();
    h.remote.fail_next(RemoteOp::InsertColumns);

    let err = h.board.add_column("Review").await.expect_err("insert fails");
    assert!(err.is_persistence_failure());
    assert_eq!(keys(&h.board.columns()), vec!["todo", "inprogress", "done"]);
    assert_eq!(failures(&drain(&mut notices)), 1);
}

#[tokio::test]
async fn protected_columns_cannot_be_deleted() {
    let h = Harness::new().ready().await;
    let id = h.create("Stay", "inprogress").await;

    for protected in ["todo", "inprogress", "done"] {
        let err = h
            .board
            .delete_column(&key(protected))
            .await
            .expect_err("protected");
        assert!(matches!(err, BoardError::Validation(_)));
    }
    assert_eq!(h.board.columns().len(), 3);
    assert_eq!(h.board.task(&id).expect("task").status, key("inprogress"));
    assert_eq!(h.remote.calls(RemoteOp::DeleteTasks), 0);
    assert_eq!(h.remote.calls(RemoteOp::DeleteColumn), 0);
}

#[tokio::test]
async fn deleting_a_column_cascades_to_its_tasks() {
    let h = Harness::new().ready().await;
    let review = h.board.add_column("Review").await.expect("column");
    for title in ["a", "b", "c"] {
        h.create(title, "review").await;
    }
    let survivor = h.create("d", "todo").await;
    let mut notices = h.board.notices();

    h.board.delete_column(&review.key).await.expect("delete");

    assert!(!h.board.has_column(&review.key));
    let tasks = h.board.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, survivor);
    assert_eq!(h.remote.task_records(&h.owner).len(), 1);
    assert_eq!(h.remote.column_records(&h.owner).len(), 3);
    assert_eq!(
        drain(&mut notices),
        vec![Notice::Saved {
            operation: Operation::DeleteColumn
        }]
    );
}

#[tokio::test]
async fn cascade_spares_task_moved_out_under_override() {
    let h = Harness::durable("cascade_spares_task_moved_out_under_override")
        .ready()
        .await;
    let backlog = h.board.add_column("Backlog").await.expect("column");
    let id = h.create("T", "backlog").await;
    h.remote.fail_next(RemoteOp::UpdateTask);
    assert_eq!(h.board.move_task_persist(&id, &key("todo")).await, Ok(false));

    h.board.delete_column(&backlog.key).await.expect("delete");

    assert_eq!(h.board.task(&id).expect("kept").status, key("todo"));
    assert_eq!(h.remote_status(&id).as_deref(), Some("todo"));
    let tasks = h.reload().list_tasks().await.expect("reload");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, key("todo"));
}

#[tokio::test]
async fn cascade_deletes_task_moved_in_under_override() {
    let h = Harness::new().ready().await;
    let backlog = h.board.add_column("Backlog").await.expect("column");
    let id = h.create("T", "todo").await;
    h.remote.fail_next(RemoteOp::UpdateTask);
    assert_eq!(h.board.move_task_persist(&id, &key("backlog")).await, Ok(false));

    h.board.delete_column(&backlog.key).await.expect("delete");

    assert!(h.board.tasks().is_empty());
    assert!(h.remote.task_records(&h.owner).is_empty());
}

#[tokio::test(start_paused = true)]
async fn cascade_waits_for_creation_in_flight() {
    let h = Harness::new().ready().await;
    let backlog = h.board.add_column("Backlog").await.expect("column");
    h.remote
        .set_latency(RemoteOp::InsertTask, Duration::from_millis(200));

    let (created, deleted) = tokio::join!(
        h.board
            .create_task(TaskInput::new("late").with_status(key("backlog"))),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.board.delete_column(&backlog.key).await
        }
    );

    created.expect("created before the cascade");
    deleted.expect("delete");
    assert_eq!(keys(&h.board.columns()), vec!["todo", "inprogress", "done"]);
    assert!(h.board.tasks().is_empty());
    assert!(h.remote.task_records(&h.owner).is_empty());
}

#[tokio::test(start_paused = true)]
async fn creation_landing_after_cascade_is_discarded() {
    let h = Harness::with_config(
        BoardConfig::default().with_identity_wait(Duration::from_millis(100)),
    )
    .ready()
    .await;
    let backlog = h.board.add_column("Backlog").await.expect("column");
    h.remote
        .set_latency(RemoteOp::InsertTask, Duration::from_millis(500));

    let (created, deleted) = tokio::join!(
        h.board
            .create_task(TaskInput::new("late").with_status(key("backlog"))),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.board.delete_column(&backlog.key).await
        }
    );

    deleted.expect("delete");
    assert!(matches!(created, Err(BoardError::Validation(_))));
    assert!(h.board.tasks().is_empty());
    assert!(h.remote.task_records(&h.owner).is_empty());
    assert_eq!(h.remote.calls(RemoteOp::DeleteTask), 1);
}

#[tokio::test]
async fn failed_cascade_keeps_the_column() {
    let h = Harness::new().ready().await;
    let review = h.board.add_column("Review").await.expect("column");
    h.create("a", "review").await;
    h.create("b", "review").await;
    h.remote.fail_next(RemoteOp::DeleteTasks);

    let err = h
        .board
        .delete_column(&review.key)
        .await
        .expect_err("cascade fails");
    assert_eq!(
        err,
        BoardError::PersistenceFailed {
            operation: Operation::DeleteColumn,
            message: "remote unavailable: injected failure: DeleteTasks".to_string(),
        }
    );
    assert!(h.board.has_column(&review.key));
    assert_eq!(h.board.snapshot().tasks_in(&review.key).count(), 2);
    assert_eq!(h.remote.task_records(&h.owner).len(), 2);
    assert_eq!(h.remote.calls(RemoteOp::DeleteColumn), 0);
}

#[tokio::test]
async fn unknown_column_cannot_be_deleted() {
    let h = Harness::new().ready().await;
    let err = h
        .board
        .delete_column(&key("archive"))
        .await
        .expect_err("unknown");
    assert!(matches!(err, BoardError::Validation(_)));
}
