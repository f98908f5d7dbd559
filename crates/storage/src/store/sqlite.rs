#![forbid(unsafe_code)]

use super::{FieldOverrides, OverrideCache, StoreError, id_kind, now_ms};
use kb_core::ids::TaskId;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE_NAME: &str = "kanban_overrides.db";
const SCHEMA_VERSION: i64 = 1;

#[derive(Debug)]
pub struct SqliteOverrideCache {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteOverrideCache {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE_NAME))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(1) FROM task_overrides", [], |row| {
                row.get::<_, i64>(0)
            })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS task_overrides (
          id_kind TEXT NOT NULL CHECK(id_kind IN ('temporary', 'durable')),
          task_id TEXT NOT NULL,
          fields_json TEXT NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY(id_kind, task_id)
        );
        "#,
    )?;

    let stored = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match stored {
        None => {
            conn.execute(
                "INSERT INTO meta(key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        }
        Some(value) if value == SCHEMA_VERSION.to_string() => Ok(()),
        Some(_) => Err(StoreError::InvalidInput(
            "override cache schema version mismatch",
        )),
    }
}

impl OverrideCache for SqliteOverrideCache {
    fn get(&self, task_id: &TaskId) -> Result<Option<FieldOverrides>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT fields_json FROM task_overrides WHERE id_kind=?1 AND task_id=?2",
                params![id_kind(task_id), task_id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, task_id: &TaskId, overrides: &FieldOverrides) -> Result<(), StoreError> {
        if overrides.is_empty() {
            self.clear(task_id)?;
            return Ok(());
        }
        let fields_json = serde_json::to_string(overrides)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO task_overrides(id_kind, task_id, fields_json, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id_kind, task_id) DO UPDATE SET fields_json=excluded.fields_json, updated_at_ms=excluded.updated_at_ms
            "#,
            params![id_kind(task_id), task_id.as_str(), fields_json, now_ms()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self, task_id: &TaskId) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM task_overrides WHERE id_kind=?1 AND task_id=?2",
            params![id_kind(task_id), task_id.as_str()],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn rename(&mut self, from: &TaskId, to: &TaskId) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;
        let fields_json = tx
            .query_row(
                "SELECT fields_json FROM task_overrides WHERE id_kind=?1 AND task_id=?2",
                params![id_kind(from), from.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(fields_json) = fields_json else {
            return Ok(false);
        };
        tx.execute(
            "DELETE FROM task_overrides WHERE id_kind=?1 AND task_id=?2",
            params![id_kind(from), from.as_str()],
        )?;
        tx.execute(
            r#"
            INSERT INTO task_overrides(id_kind, task_id, fields_json, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id_kind, task_id) DO UPDATE SET fields_json=excluded.fields_json, updated_at_ms=excluded.updated_at_ms
            "#,
            params![id_kind(to), to.as_str(), fields_json, now_ms()],
        )?;
        tx.commit()?;
        Ok(true)
    }
}
