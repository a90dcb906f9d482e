//! Repository for the `tasks` table.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so concurrent dispatchers never
//! block on, or double-claim, the same row. Every transition out of
//! `claimed` carries `status_id = claimed` in its `WHERE` clause, which
//! makes the status check and the write one atomic statement.

use std::time::Duration;

use crawlq_core::schema::SchemaKind;
use crawlq_core::status::{StatusId, TaskStatus};
use crawlq_core::types::DbId;
use sqlx::PgPool;

use crate::models::task::{TaskCountRow, TaskRow};
use crate::models::task_result::TaskResultRow;
use crate::repositories::{result_repo, SchemaRepo};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, status_id, worker_id, claimed_at, retry_count, note, \
                       data, created_at, updated_at";

/// Claimability predicate. Expects the lease in seconds (or NULL) as `$3`.
fn claimable_clause() -> String {
    format!(
        "(status_id = {pending} OR ($3::float8 IS NOT NULL AND status_id = {claimed} \
         AND claimed_at <= NOW() - make_interval(secs => $3::float8)))",
        pending = TaskStatus::Pending.id(),
        claimed = TaskStatus::Claimed.id(),
    )
}

fn lease_secs(lease: Option<Duration>) -> Option<f64> {
    lease.map(|d| d.as_secs_f64())
}

/// Outcome of [`TaskRepo::complete`].
#[derive(Debug)]
pub enum Completion {
    Stored(TaskResultRow),
    /// The task was not `claimed`.
    NotClaimed,
    /// The result schema was redefined since the row was built.
    SchemaChanged,
}

/// Provides queue operations over tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Insert one pending task per JSON object, preserving input order in
    /// the assigned ids. Returns the number of rows inserted, or `None`,
    /// with nothing written, if the task schema no longer equals `columns`.
    pub async fn insert_batch(
        pool: &PgPool,
        project_id: DbId,
        columns: &[String],
        rows: &[serde_json::Value],
    ) -> Result<Option<u64>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let current = SchemaRepo::find_for_share(&mut *tx, project_id, SchemaKind::Task).await?;
        if current.as_deref() != Some(columns) {
            tx.rollback().await?;
            return Ok(None);
        }

        let result = sqlx::query(
            "INSERT INTO tasks (project_id, data)
             SELECT $1, payload
             FROM UNNEST($2::jsonb[]) WITH ORDINALITY AS batch(payload, ord)
             ORDER BY ord",
        )
        .bind(project_id)
        .bind(rows)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(result.rows_affected()))
    }

    /// Find a task by ID within a project.
    pub async fn find_by_id(
        pool: &PgPool,
        project_id: DbId,
        task_id: DbId,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE project_id = $1 AND id = $2");
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(project_id)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest claimable task for `worker_id`.
    ///
    /// If the worker already holds a claimed task, that row is returned
    /// unchanged and nothing new is claimed.
    pub async fn claim_next(
        pool: &PgPool,
        project_id: DbId,
        worker_id: &str,
        lease: Option<Duration>,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!(
            "WITH existing AS (
                 SELECT {COLUMNS} FROM tasks
                 WHERE project_id = $1 AND worker_id = $2 AND status_id = {claimed}
                 ORDER BY id
                 LIMIT 1
             ),
             candidate AS (
                 SELECT id FROM tasks
                 WHERE project_id = $1 AND {claimable}
                   AND NOT EXISTS (SELECT 1 FROM existing)
                 ORDER BY id
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             ),
             updated AS (
                 UPDATE tasks
                 SET status_id = {claimed}, worker_id = $2, claimed_at = NOW()
                 WHERE id = (SELECT id FROM candidate)
                 RETURNING {COLUMNS}
             )
             SELECT {COLUMNS} FROM existing
             UNION ALL
             SELECT {COLUMNS} FROM updated",
            claimed = TaskStatus::Claimed.id(),
            claimable = claimable_clause(),
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(project_id)
            .bind(worker_id)
            .bind(lease_secs(lease))
            .fetch_optional(pool)
            .await
    }

    /// The oldest task `worker_id` currently holds a claim on.
    pub async fn find_claimed_by(
        pool: &PgPool,
        project_id: DbId,
        worker_id: &str,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks
             WHERE project_id = $1 AND worker_id = $2 AND status_id = $3
             ORDER BY id
             LIMIT 1"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(project_id)
            .bind(worker_id)
            .bind(TaskStatus::Claimed.id())
            .fetch_optional(pool)
            .await
    }

    /// Up to `limit` claimable task IDs in FIFO order.
    pub async fn claim_candidates(
        pool: &PgPool,
        project_id: DbId,
        lease: Option<Duration>,
        limit: i64,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let query = format!(
            "SELECT id FROM tasks
             WHERE project_id = $1 AND {claimable}
             ORDER BY id
             LIMIT $2",
            claimable = claimable_clause(),
        );
        sqlx::query_scalar::<_, DbId>(&query)
            .bind(project_id)
            .bind(limit)
            .bind(lease_secs(lease))
            .fetch_all(pool)
            .await
    }

    /// Claim one specific task if it is still claimable.
    pub async fn try_claim(
        pool: &PgPool,
        project_id: DbId,
        task_id: DbId,
        worker_id: &str,
        lease: Option<Duration>,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks
             SET status_id = {claimed}, worker_id = $2, claimed_at = NOW()
             WHERE project_id = $1 AND id = $4 AND {claimable}
             RETURNING {COLUMNS}",
            claimed = TaskStatus::Claimed.id(),
            claimable = claimable_clause(),
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(project_id)
            .bind(worker_id)
            .bind(lease_secs(lease))
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// Move a claimed task to `done` and insert its result row in one
    /// transaction. Nothing is written unless the task is `claimed` and the
    /// result schema still equals `columns`.
    pub async fn complete(
        pool: &PgPool,
        project_id: DbId,
        task_id: DbId,
        columns: &[String],
        data: &serde_json::Value,
    ) -> Result<Completion, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let updated: Option<DbId> = sqlx::query_scalar(
            "UPDATE tasks SET status_id = $3
             WHERE project_id = $1 AND id = $2 AND status_id = $4
             RETURNING id",
        )
        .bind(project_id)
        .bind(task_id)
        .bind(TaskStatus::Done.id())
        .bind(TaskStatus::Claimed.id())
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            return Ok(Completion::NotClaimed);
        }

        let current = SchemaRepo::find_for_share(&mut *tx, project_id, SchemaKind::Result).await?;
        if current.as_deref() != Some(columns) {
            tx.rollback().await?;
            return Ok(Completion::SchemaChanged);
        }

        let query = format!(
            "INSERT INTO task_results (project_id, task_id, data)
             VALUES ($1, $2, $3)
             RETURNING {}",
            result_repo::COLUMNS
        );
        let result = sqlx::query_as::<_, TaskResultRow>(&query)
            .bind(project_id)
            .bind(task_id)
            .bind(data)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Completion::Stored(result))
    }

    /// Record a failure on a claimed task: bump `retry_count`, store the
    /// note, release the claim, and move it to `failed` once the new count
    /// reaches `max_retries` (never, if `None`), else back to `pending`.
    ///
    /// Returns the new `(status_id, retry_count)`, or `None` if the task is
    /// not `claimed`.
    pub async fn fail(
        pool: &PgPool,
        project_id: DbId,
        task_id: DbId,
        note: Option<&str>,
        max_retries: Option<i32>,
    ) -> Result<Option<(StatusId, i32)>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET
                retry_count = retry_count + 1,
                note = $3,
                worker_id = NULL,
                claimed_at = NULL,
                status_id = CASE
                    WHEN $4::int4 IS NOT NULL AND retry_count + 1 >= $4::int4 THEN {failed}
                    ELSE {pending}
                END
             WHERE project_id = $1 AND id = $2 AND status_id = {claimed}
             RETURNING status_id, retry_count",
            failed = TaskStatus::Failed.id(),
            pending = TaskStatus::Pending.id(),
            claimed = TaskStatus::Claimed.id(),
        );
        sqlx::query_as::<_, (StatusId, i32)>(&query)
            .bind(project_id)
            .bind(task_id)
            .bind(note)
            .bind(max_retries)
            .fetch_optional(pool)
            .await
    }

    /// Current status of a task, or `None` if it does not exist.
    pub async fn find_status(
        pool: &PgPool,
        project_id: DbId,
        task_id: DbId,
    ) -> Result<Option<StatusId>, sqlx::Error> {
        sqlx::query_scalar("SELECT status_id FROM tasks WHERE project_id = $1 AND id = $2")
            .bind(project_id)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// Total and done task counts for a project.
    pub async fn counts(pool: &PgPool, project_id: DbId) -> Result<TaskCountRow, sqlx::Error> {
        sqlx::query_as::<_, TaskCountRow>(
            "SELECT COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE status_id = $2) AS done
             FROM tasks WHERE project_id = $1",
        )
        .bind(project_id)
        .bind(TaskStatus::Done.id())
        .fetch_one(pool)
        .await
    }
}
