//! SQLite-backed key-value store

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::debug;

use crate::cache::store::KvStore;
use crate::error::{LinkError, Result};

const MIGRATIONS: [&str; 1] = ["CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY NOT NULL,
        value BLOB NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );"];

pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Persistent store in a single SQLite table, with an optional byte quota.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_bytes: Option<u64>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>, max_bytes: Option<u64>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;
        debug!(path = %path.display(), "opened sqlite vector store");
        Self::from_connection(conn, max_bytes)
    }

    /// In-memory database (tests, ephemeral runs).
    pub fn open_in_memory(max_bytes: Option<u64>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, max_bytes)
    }

    fn from_connection(conn: Connection, max_bytes: Option<u64>) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_bytes,
        })
    }

    /// Bytes held by keys and values.
    pub fn used_bytes(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let used: i64 = conn.query_row(
            "SELECT COALESCE(SUM(length(key) + length(value)), 0) FROM kv_store",
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(used).unwrap_or(0))
    }
}

fn run_migrations(conn: &Connection) -> Result<u32> {
    let current_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let target_version = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        if current_version >= target_version {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.pragma_update(None, "user_version", target_version)?;
    }

    Ok(SCHEMA_VERSION)
}

fn is_disk_full(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DiskFull
    )
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.conn.lock();

        if let Some(max_bytes) = self.max_bytes {
            let used: i64 = conn.query_row(
                "SELECT COALESCE(SUM(length(key) + length(value)), 0) FROM kv_store WHERE key != ?",
                [key],
                |row| row.get(0),
            )?;
            let used = u64::try_from(used).unwrap_or(0);
            let needed = (key.len() + value.len()) as u64;
            if used + needed > max_bytes {
                return Err(LinkError::QuotaExceeded(format!(
                    "sqlite store: {needed} bytes requested, {used}/{max_bytes} in use"
                )));
            }
        }

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )
        .map_err(|err| {
            if is_disk_full(&err) {
                LinkError::QuotaExceeded(err.to_string())
            } else {
                LinkError::Database(err)
            }
        })?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT key FROM kv_store WHERE substr(key, 1, ?) = ? ORDER BY key")?;
        let prefix_len = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![prefix_len, prefix], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let prefix_len = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
        let removed = conn.execute(
            "DELETE FROM kv_store WHERE substr(key, 1, ?) = ?",
            params![prefix_len, prefix],
        )?;
        Ok(removed)
    }
}
