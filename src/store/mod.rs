//! Durable task store
//!
//! A single SQLite table of named work items, shared by every worker that opens
//! the same file, including workers in other OS processes.
//!
//! ## Submodules
//!
//! Methods on [`Store`] are organized by concern:
//! - [`migrations`] — open, schema creation, explicit re-initialization, close
//! - [`tasks`] — the task lifecycle: add, take, processed, cancelled, get_status
//! - [`inspect`] — read-only reporting: counts, listings, stale claims
//!
//! ## Write discipline
//!
//! Every mutation holds the handle's writer mutex and runs inside a
//! `BEGIN IMMEDIATE` transaction. The mutex serializes writers sharing one
//! handle; the immediate transaction takes SQLite's reserved lock up front, so
//! writers in other processes are serialized by the file lock. A `take` can
//! therefore never hand the same task to two callers.
//!
//! Transactions roll back when dropped uncommitted. A write abandoned through
//! a timeout or `select!` releases the lock instead of leaving it held on a
//! pooled connection.

use crate::error::StoreError;
use crate::types::{Task, TaskStatus};
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::{FromRow, Transaction};
use std::path::PathBuf;

mod inspect;
mod migrations;
mod tasks;

/// Task record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique task name
    pub name: String,
    /// Status column value (PENDING, TAKEN, PROCESSED, CANCELLED)
    pub status: String,
    /// Diagnostic text
    pub detail: Option<String>,
    /// Unix timestamp in milliseconds when the task was created or claimed
    pub begin: Option<i64>,
    /// Unix timestamp in milliseconds when the task was finalized
    pub end_process: Option<i64>,
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        let status = TaskStatus::parse(&row.status).ok_or_else(|| {
            Error::Store(StoreError::QueryFailed(format!(
                "task {} has unknown status '{}'",
                row.name, row.status
            )))
        })?;

        Ok(Task {
            name: row.name,
            status,
            detail: row.detail,
            begin: row.begin.and_then(from_millis),
            end_process: row.end_process.and_then(from_millis),
        })
    }
}

/// Columns selected for every task query, in [`TaskRow`] order
const TASK_COLUMNS: &str = r#"name, status, detail, "begin", end_process"#;

/// Handle to one task store file
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Store {
    pool: SqlitePool,
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl Store {
    /// Start a write transaction that takes SQLite's reserved lock up front
    ///
    /// Dropping the transaction uncommitted rolls it back, so a caller that is
    /// cancelled mid-write never returns a locked connection to the pool.
    async fn begin_write(&self, operation: &str) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| Error::Store(StoreError::query(operation, e)))
    }
}

async fn commit(tx: Transaction<'_, Sqlite>, operation: &str) -> Result<()> {
    tx.commit()
        .await
        .map_err(|e| Error::Store(StoreError::query(operation, e)))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Empty detail strings are stored as NULL
fn detail_value(detail: &str) -> Option<&str> {
    (!detail.is_empty()).then_some(detail)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
