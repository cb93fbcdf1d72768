//! SQLite-backed key-value store.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::KeyValueStore;
use crate::error::{VigilError, VigilResult};

/// SQLite implementation of [`KeyValueStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_value_bytes: Option<usize>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> VigilResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            max_value_bytes: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> VigilResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            max_value_bytes: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Reject writes of values larger than `bytes`.
    pub fn with_max_value_bytes(mut self, bytes: usize) -> Self {
        self.max_value_bytes = Some(bytes);
        self
    }

    fn init_schema(&self) -> VigilResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| VigilError::storage(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> VigilResult<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| VigilError::storage(e.to_string()))?;
        let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> VigilResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| VigilError::storage(e.to_string()))?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> VigilResult<()> {
        if let Some(limit) = self.max_value_bytes {
            if value.len() > limit {
                return Err(VigilError::capacity(value.len(), limit));
            }
        }
        let conn = self
            .conn
            .lock()
            .map_err(|e| VigilError::storage(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::DiskFull
                    || err.code == rusqlite::ErrorCode::TooBig =>
            {
                VigilError::CapacityExceeded {
                    message: e.to_string(),
                    code: crate::error::ErrorCode::StoCapacity,
                    attempted_bytes: Some(value.len()),
                    limit_bytes: None,
                }
            }
            other => other.into(),
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> VigilResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| VigilError::storage(e.to_string()))?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}
