use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::db::init_db;
use crate::error::StoreError;
use crate::store::Store;

/// SQLite-backed store: one row per key in the `kv` table.
///
/// Thread-safe: the connection is wrapped in a Mutex. The mutex only protects
/// the connection itself; it gives callers no compare-and-set semantics.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Result<Self, StoreError> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> Result<String, StoreError> {
        let db = self.conn();
        db.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let db = self.conn();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            rusqlite::params![key, value, now],
        )?;
        debug!(key, "store value written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_found() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.get("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn set_then_get_and_overwrite() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("signal:account", "a").unwrap();
        assert_eq!(store.get("signal:account").unwrap(), "a");
        store.set("signal:account", "b").unwrap();
        assert_eq!(store.get("signal:account").unwrap(), "b");
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("matrix:next_batch", "s72594_4483_1934").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("matrix:next_batch").unwrap(), "s72594_4483_1934");
    }
}
