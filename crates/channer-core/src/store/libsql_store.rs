//! Persistent local store on libSQL
//!
//! Holds this device's copy of every synced document plus the engine's
//! bookkeeping flags. Always available; no size ceiling of its own.

use std::path::Path;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::{KeyValueStore, StoreError, StoreResult};
use crate::error::Result;
use crate::util::unix_timestamp_millis_now;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// libSQL-backed key-value store
pub struct LibSqlStore {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl std::fmt::Debug for LibSqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibSqlStore").finish_non_exhaustive()
    }
}

impl LibSqlStore {
    /// Open a store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let path_str = path.as_ref().to_string_lossy().to_string();
        Self::open_local(&path_str).await
    }

    /// Open an in-memory store (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_local(":memory:").await
    }

    async fn open_local(path: &str) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        let store = Self { _db: db, conn };
        store.configure().await;
        store.migrate().await?;
        Ok(store)
    }

    async fn configure(&self) {
        // Pragmas are best effort; in-memory databases reject WAL
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
    }

    async fn migrate(&self) -> Result<()> {
        let version = self.schema_version().await?;
        if version < 1 {
            self.migrate_v1().await?;
        }
        Ok(())
    }

    async fn schema_version(&self) -> Result<i32> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                (),
            )
            .await?;

        let exists = if let Some(row) = rows.next().await? {
            row.get::<i32>(0)? != 0
        } else {
            false
        };
        if !exists {
            return Ok(0);
        }

        let mut rows = self
            .conn
            .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
            .await?;
        let version = if let Some(row) = rows.next().await? {
            row.get::<i32>(0)?
        } else {
            0
        };
        Ok(version)
    }

    /// Migration to version 1: key-value table
    async fn migrate_v1(&self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let statements = [
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "INSERT INTO schema_version (version) VALUES (1)",
        ];

        for stmt in statements {
            if let Err(e) = self.conn.execute(stmt, ()).await {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        tracing::info!("Migrated local sync store to version {CURRENT_VERSION}");
        Ok(())
    }
}

fn backend_error(error: &libsql::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

impl KeyValueStore for LibSqlStore {
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                libsql::params![key, value.to_vec(), unix_timestamp_millis_now()],
            )
            .await
            .map_err(|error| backend_error(&error))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_store WHERE key = ?1", [key])
            .await
            .map_err(|error| backend_error(&error))?;

        match rows.next().await.map_err(|error| backend_error(&error))? {
            Some(row) => Ok(Some(
                row.get::<Vec<u8>>(0)
                    .map_err(|error| backend_error(&error))?,
            )),
            None => Ok(None),
        }
    }

    fn is_available(&self) -> bool {
        true
    }
}
