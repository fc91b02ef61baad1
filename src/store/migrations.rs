//! Store lifecycle: open, schema migrations, re-initialization, close.

use crate::error::StoreError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;

use super::{Store, commit};

/// How long a writer waits on another process's lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Latest schema version this build knows how to create
const SCHEMA_VERSION: i64 = 1;

impl Store {
    /// Open or create the task store at `path`
    ///
    /// Creates the file (and its parent directory) if missing and applies any
    /// pending schema migrations. Existing rows are never touched; use
    /// [`Store::reinitialize`] to wipe the table explicitly.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Store(StoreError::OpenFailed(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // WAL lets readers proceed while another worker holds the write lock
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Store(StoreError::OpenFailed(format!(
                "Failed to open {}: {}",
                path.display(),
                e
            )))
        })?;

        let store = Self {
            pool,
            path: path.to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        };

        store.run_migrations().await?;

        tracing::info!(path = %path.display(), "task store opened");
        Ok(store)
    }

    /// Drop every task and recreate an empty table
    pub async fn reinitialize(&self) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let mut tx = self.begin_write("reinitialize store").await?;

        sqlx::query("DROP TABLE IF EXISTS task")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Store(StoreError::query("drop task table", e)))?;
        Self::create_task_schema(&mut tx).await?;
        commit(tx, "reinitialize store").await?;

        tracing::info!(path = %self.path.display(), "task store re-initialized");
        Ok(())
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let version = Self::current_version(&mut conn).await?;
        drop(conn);

        if version < SCHEMA_VERSION {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    async fn current_version(conn: &mut SqliteConnection) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                Error::Store(StoreError::MigrationFailed(format!(
                    "Failed to query schema version: {}",
                    e
                )))
            })?;

        Ok(version.unwrap_or(0))
    }

    /// Migration v1: task table and status index
    async fn migrate_v1(&self) -> Result<()> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to begin migration v1: {}",
                e
            )))
        })?;

        // Another process may have migrated between our check and the lock
        if Self::current_version(&mut tx).await? >= 1 {
            return Ok(());
        }

        tracing::info!("Applying store migration v1");
        Self::create_task_schema(&mut tx).await?;
        Self::record_migration(&mut tx, 1).await?;
        tx.commit().await.map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to commit migration v1: {}",
                e
            )))
        })?;

        tracing::info!("Store migration v1 complete");
        Ok(())
    }

    /// Create the task table and its status index
    async fn create_task_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task (
                name TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                detail TEXT,
                "begin" TIMESTAMP,
                end_process TIMESTAMP
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Store(StoreError::MigrationFailed(format!(
                "Failed to create task table: {}",
                e
            )))
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS by_status ON task(status)")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Store(StoreError::MigrationFailed(format!(
                    "Failed to create by_status index: {}",
                    e
                )))
            })?;

        Ok(())
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Store(StoreError::MigrationFailed(format!(
                    "Failed to record migration v{}: {}",
                    version, e
                )))
            })?;
        Ok(())
    }

    /// Release the underlying file handles
    ///
    /// Safe to call more than once. Operations after close fail with
    /// [`StoreError::Closed`].
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            tracing::debug!(path = %self.path.display(), "closing task store");
        }
        self.pool.close().await;
    }

    /// Whether [`Store::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
