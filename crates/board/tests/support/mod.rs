#![allow(dead_code)]

use kb_board::{
    Board, BoardConfig, ColumnKey, MemoryRecordStore, Notice, PrincipalId, SessionPrincipal,
    TaskId, TaskInput,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("kb_board=debug".parse().expect("directive")),
        )
        .with_test_writer()
        .try_init();
}

pub fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("kb_board_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn key(value: &str) -> ColumnKey {
    ColumnKey::try_new(value).expect("column key")
}

pub fn durable(value: &str) -> TaskId {
    TaskId::durable(value).expect("durable id")
}

pub fn drain(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

pub fn failures(notices: &[Notice]) -> usize {
    notices.iter().filter(|n| n.is_failure()).count()
}

pub struct Harness {
    pub board: Arc<Board>,
    pub remote: Arc<MemoryRecordStore>,
    pub principal: Arc<SessionPrincipal>,
    pub owner: PrincipalId,
    pub config: BoardConfig,
}

impl Harness {
    /// Board over an in-memory remote and an in-memory override cache.
    pub fn new() -> Self {
        Self::with_config(BoardConfig::default())
    }

    /// Board whose override cache lives in a SQLite file, so `reload` keeps it.
    pub fn durable(test_name: &str) -> Self {
        Self::with_config(BoardConfig::default().with_state_dir(temp_dir(test_name)))
    }

    pub fn with_config(config: BoardConfig) -> Self {
        init_test_logging();
        let owner = PrincipalId::try_new("user-1").expect("principal");
        let remote = Arc::new(MemoryRecordStore::new());
        let principal = Arc::new(SessionPrincipal::signed_in(owner.clone()));
        let board = Arc::new(build_board(&remote, &principal, &config));
        Self {
            board,
            remote,
            principal,
            owner,
            config,
        }
    }

    /// Simulates a cold start: a fresh board over the same remote and cache backend.
    pub fn reload(&self) -> Arc<Board> {
        Arc::new(build_board(&self.remote, &self.principal, &self.config))
    }

    pub async fn ready(self) -> Self {
        self.board.list_columns().await.expect("list columns");
        self.board.list_tasks().await.expect("list tasks");
        self
    }

    pub async fn create(&self, title: &str, status: &str) -> TaskId {
        self.board
            .create_task(TaskInput::new(title).with_status(key(status)))
            .await
            .expect("create task")
            .id
    }

    pub fn remote_status(&self, id: &TaskId) -> Option<String> {
        self.remote
            .task_records(&self.owner)
            .into_iter()
            .find(|record| record.id == id.as_str())
            .map(|record| record.status)
    }
}

fn build_board(
    remote: &Arc<MemoryRecordStore>,
    principal: &Arc<SessionPrincipal>,
    config: &BoardConfig,
) -> Board {
    let cache = config.open_override_cache().expect("open override cache");
    Board::new(remote.clone(), principal.clone(), cache, config.clone())
}
