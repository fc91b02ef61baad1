//! Read-only reporting over the task table.

use crate::error::StoreError;
use crate::types::{Task, TaskCounts, TaskStatus};
use crate::{Error, Result};
use std::time::Duration;

use super::{Store, TASK_COLUMNS, TaskRow, now_millis};

impl Store {
    /// Count tasks per status
    pub async fn counts(&self) -> Result<TaskCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM task GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::Store(StoreError::query("count tasks", e)))?;

        let mut counts = TaskCounts::default();
        for (status, count) in rows {
            let count = count.max(0) as u64;
            match TaskStatus::parse(&status) {
                Some(TaskStatus::Pending) => counts.pending = count,
                Some(TaskStatus::Taken) => counts.taken = count,
                Some(TaskStatus::Processed) => counts.processed = count,
                Some(TaskStatus::Cancelled) => counts.cancelled = count,
                None => {
                    tracing::warn!(status = %status, count, "ignoring rows with unknown status");
                }
            }
        }
        Ok(counts)
    }

    /// List tasks with `status`, ordered by name
    pub async fn list(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM task WHERE status = ? ORDER BY name",
            TASK_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::query("list tasks", e)))?;

        rows.into_iter().map(Task::try_from).collect()
    }

    /// Tasks claimed longer ago than `older_than` and still not finalized
    ///
    /// These are usually left behind by a worker that died mid-batch. They are
    /// only reported; nothing moves them back to pending.
    pub async fn stale_claims(&self, older_than: Duration) -> Result<Vec<Task>> {
        let age = i64::try_from(older_than.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_millis().saturating_sub(age);

        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            r#"SELECT {} FROM task WHERE status = ? AND "begin" < ? ORDER BY "begin""#,
            TASK_COLUMNS
        ))
        .bind(TaskStatus::Taken.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::query("list stale claims", e)))?;

        rows.into_iter().map(Task::try_from).collect()
    }
}
