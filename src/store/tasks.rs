//! Task lifecycle: add, take, processed, cancelled, get_status.

use crate::error::StoreError;
use crate::types::{Task, TaskStatus};
use crate::{Error, Result};
use sqlx::SqliteConnection;

use super::{Store, TASK_COLUMNS, TaskRow, commit, detail_value, now_millis};

impl Store {
    /// Insert a new pending task
    ///
    /// Fails with [`StoreError::Duplicate`] if `name` already exists.
    pub async fn add(&self, name: &str, detail: &str) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let mut tx = self.begin_write("add task").await?;

        insert_pending(&mut tx, name, detail, now_millis()).await?;
        commit(tx, "add task").await?;

        tracing::debug!(task = name, "task added");
        Ok(())
    }

    /// Insert many pending tasks in one transaction
    ///
    /// Either every name is added or none is: the first existing name aborts
    /// the whole insert with [`StoreError::Duplicate`].
    pub async fn add_many<I, S>(&self, names: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _writer = self.write_lock.lock().await;
        let mut tx = self.begin_write("add tasks").await?;
        let now = now_millis();

        let mut added = 0;
        for name in names {
            insert_pending(&mut tx, name.as_ref(), "", now).await?;
            added += 1;
        }
        commit(tx, "add tasks").await?;

        tracing::info!(count = added, "tasks added");
        Ok(added)
    }

    /// Claim one pending task
    ///
    /// Moves an arbitrary pending task to `TAKEN`, stamping `begin` and
    /// `detail`, and returns its name. Returns `None` when nothing is pending.
    /// Concurrent callers, in this process or another, never receive the same
    /// task.
    pub async fn take(&self, detail: &str) -> Result<Option<String>> {
        let _writer = self.write_lock.lock().await;
        let mut tx = self.begin_write("take task").await?;

        let name: Option<String> =
            sqlx::query_scalar("SELECT name FROM task WHERE status = ? LIMIT 1")
                .bind(TaskStatus::Pending.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| Error::Store(StoreError::query("select pending task", e)))?;

        let Some(name) = name else {
            commit(tx, "take task").await?;
            return Ok(None);
        };

        sqlx::query(r#"UPDATE task SET status = ?, detail = ?, "begin" = ? WHERE name = ?"#)
            .bind(TaskStatus::Taken.as_str())
            .bind(detail_value(detail))
            .bind(now_millis())
            .bind(&name)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Store(StoreError::query("claim task", e)))?;
        commit(tx, "take task").await?;

        tracing::debug!(task = %name, "task taken");
        Ok(Some(name))
    }

    /// Mark a taken task as successfully processed
    pub async fn processed(&self, name: &str, detail: &str) -> Result<()> {
        self.finalize(name, TaskStatus::Processed, detail).await
    }

    /// Mark a taken task as cancelled, recording why in `detail`
    pub async fn cancelled(&self, name: &str, detail: &str) -> Result<()> {
        self.finalize(name, TaskStatus::Cancelled, detail).await
    }

    /// Fetch the full row for `name`
    ///
    /// Fails with [`StoreError::UnknownTask`] if absent.
    pub async fn get_status(&self, name: &str) -> Result<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM task WHERE name = ?",
            TASK_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::query("get task status", e)))?;

        match row {
            Some(row) => Task::try_from(row),
            None => Err(Error::Store(StoreError::UnknownTask {
                name: name.to_string(),
            })),
        }
    }

    /// Move a `TAKEN` task to a terminal status
    ///
    /// A terminal task fails with [`StoreError::AlreadyFinalized`]; a task
    /// that was never claimed fails with [`StoreError::InvalidTransition`].
    async fn finalize(&self, name: &str, status: TaskStatus, detail: &str) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let mut tx = self.begin_write("finalize task").await?;

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM task WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Store(StoreError::query("look up task", e)))?;

        let Some(current) = current else {
            return Err(Error::Store(StoreError::UnknownTask {
                name: name.to_string(),
            }));
        };

        match TaskStatus::parse(&current) {
            Some(TaskStatus::Taken) => {}
            Some(existing) if existing.is_terminal() => {
                return Err(Error::Store(StoreError::AlreadyFinalized {
                    name: name.to_string(),
                    status: current,
                }));
            }
            _ => {
                return Err(Error::Store(StoreError::InvalidTransition {
                    name: name.to_string(),
                    status: current,
                }));
            }
        }

        sqlx::query("UPDATE task SET status = ?, detail = ?, end_process = ? WHERE name = ?")
            .bind(status.as_str())
            .bind(detail_value(detail))
            .bind(now_millis())
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Store(StoreError::query("finalize task", e)))?;
        commit(tx, "finalize task").await?;

        tracing::debug!(task = name, status = %status, "task finalized");
        Ok(())
    }
}

async fn insert_pending(
    conn: &mut SqliteConnection,
    name: &str,
    detail: &str,
    now: i64,
) -> Result<()> {
    sqlx::query(r#"INSERT INTO task (name, status, detail, "begin") VALUES (?, ?, ?, ?)"#)
        .bind(name)
        .bind(TaskStatus::Pending.as_str())
        .bind(detail_value(detail))
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if is_duplicate_key(db.as_ref()) => {
                Error::Store(StoreError::Duplicate {
                    name: name.to_string(),
                })
            }
            other => Error::Store(StoreError::query("insert task", other)),
        })?;
    Ok(())
}

/// SQLITE_CONSTRAINT_PRIMARYKEY (1555) or SQLITE_CONSTRAINT_UNIQUE (2067)
fn is_duplicate_key(err: &dyn sqlx::error::DatabaseError) -> bool {
    err.is_unique_violation() || matches!(err.code().as_deref(), Some("1555") | Some("2067"))
}
