#![forbid(unsafe_code)]

use kb_storage::{MemoryOverrideCache, OverrideCache, SqliteOverrideCache, StoreError};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_IDENTITY_WAIT_MS: u64 = 1_000;
const MAX_IDENTITY_WAIT_MS: u64 = 30_000;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_NOTICE_CAPACITY: usize = 64;

const ENV_IDENTITY_WAIT_MS: &str = "KANBAN_IDENTITY_WAIT_MS";
const ENV_REMOTE_TIMEOUT_MS: &str = "KANBAN_REMOTE_TIMEOUT_MS";
const ENV_STATE_DIR: &str = "KANBAN_STATE_DIR";
const ENV_NOTICE_CAPACITY: &str = "KANBAN_NOTICE_CAPACITY";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardConfig {
    /// Upper bound on waiting for a just-created task to receive its durable id.
    pub identity_wait: Duration,
    /// Any single remote call taking longer than this counts as failed.
    pub remote_timeout: Duration,
    /// Directory for the SQLite override cache; in-memory when unset.
    pub state_dir: Option<PathBuf>,
    pub notice_capacity: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            identity_wait: Duration::from_millis(DEFAULT_IDENTITY_WAIT_MS),
            remote_timeout: Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS),
            state_dir: None,
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { var, value } => {
                write!(f, "{var} must be a non-negative integer (got {value:?})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl BoardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    /// Builds a config from `lookup`, which returns trimmed non-empty values only.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_IDENTITY_WAIT_MS) {
            let ms = parse_number(ENV_IDENTITY_WAIT_MS, &raw)?;
            config.identity_wait = Duration::from_millis(ms.min(MAX_IDENTITY_WAIT_MS));
        }
        if let Some(raw) = lookup(ENV_REMOTE_TIMEOUT_MS) {
            let ms = parse_number(ENV_REMOTE_TIMEOUT_MS, &raw)?;
            config.remote_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(raw) = lookup(ENV_STATE_DIR) {
            config.state_dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup(ENV_NOTICE_CAPACITY) {
            let capacity = parse_number(ENV_NOTICE_CAPACITY, &raw)?;
            config.notice_capacity = usize::try_from(capacity).unwrap_or(usize::MAX).max(1);
        }
        Ok(config)
    }

    pub fn with_identity_wait(mut self, wait: Duration) -> Self {
        self.identity_wait = wait;
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn open_override_cache(&self) -> Result<Box<dyn OverrideCache>, StoreError> {
        match &self.state_dir {
            Some(dir) => Ok(Box::new(SqliteOverrideCache::open(dir)?)),
            None => Ok(Box::new(MemoryOverrideCache::new())),
        }
    }
}

fn parse_number(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: raw.to_string(),
    })
}
