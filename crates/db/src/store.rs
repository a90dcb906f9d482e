//! PostgreSQL-backed [`QueueStore`].

use std::time::Duration;

use async_trait::async_trait;
use crawlq_core::error::CoreError;
use crawlq_core::policy::QueuePolicy;
use crawlq_core::progress::TaskCounts;
use crawlq_core::queue::{QueueStore, Transition};
use crawlq_core::record::{FailureOutcome, Project, ResultRecord, Row, TaskRecord};
use crawlq_core::schema::{schema_changed, SchemaKind};
use crawlq_core::status::{StatusId, TaskStatus};
use crawlq_core::types::DbId;

use crate::models::task::TaskRow;
use crate::repositories::task_repo::Completion;
use crate::repositories::{ProjectRepo, ResultRepo, SchemaRepo, TaskRepo};
use crate::DbPool;

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

/// Map a sqlx error into the core taxonomy, logging the detail server-side.
fn db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return CoreError::Conflict(db_err.message().to_string());
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(format!("Database error: {err}"))
}

fn task_status(status_id: StatusId) -> Result<TaskStatus, CoreError> {
    TaskStatus::from_id(status_id)
        .ok_or_else(|| CoreError::Internal(format!("Unknown task status id {status_id}")))
}

fn row_to_json(row: &Row) -> serde_json::Value {
    serde_json::Value::Object(row.clone().into_iter().collect())
}

/// Queue storage over the shared `tasks` / `task_results` tables.
#[derive(Debug, Clone)]
pub struct PgQueueStore {
    pool: DbPool,
}

impl PgQueueStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn columns(&self, project_id: DbId, kind: SchemaKind) -> Result<Vec<String>, CoreError> {
        Ok(SchemaRepo::find(&self.pool, project_id, kind)
            .await
            .map_err(db_error)?
            .unwrap_or_default())
    }

    async fn to_record(&self, project_id: DbId, row: TaskRow) -> Result<TaskRecord, CoreError> {
        let columns = self.columns(project_id, SchemaKind::Task).await?;
        let status_id = row.status_id;
        row.into_record(&columns)
            .ok_or_else(|| CoreError::Internal(format!("Unknown task status id {status_id}")))
    }

    async fn to_record_opt(
        &self,
        project_id: DbId,
        row: Option<TaskRow>,
    ) -> Result<Option<TaskRecord>, CoreError> {
        match row {
            Some(row) => Ok(Some(self.to_record(project_id, row).await?)),
            None => Ok(None),
        }
    }

    /// Why a conditional transition did not apply.
    async fn missed<T>(&self, project_id: DbId, task_id: DbId) -> Result<Transition<T>, CoreError> {
        match TaskRepo::find_status(&self.pool, project_id, task_id)
            .await
            .map_err(db_error)?
        {
            Some(status_id) => Ok(Transition::WrongState(task_status(status_id)?)),
            None => Ok(Transition::NotFound),
        }
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(db_error)
    }

    async fn find_project(&self, project_id: DbId) -> Result<Option<Project>, CoreError> {
        let Some(row) = ProjectRepo::find_by_id(&self.pool, project_id)
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let status_id = row.status_id;
        row.into_project()
            .map(Some)
            .ok_or_else(|| CoreError::Internal(format!("Unknown project status id {status_id}")))
    }

    async fn replace_schema(
        &self,
        project_id: DbId,
        kind: SchemaKind,
        columns: &[String],
    ) -> Result<(), CoreError> {
        SchemaRepo::replace(&self.pool, project_id, kind, columns)
            .await
            .map_err(db_error)
    }

    async fn find_schema(
        &self,
        project_id: DbId,
        kind: SchemaKind,
    ) -> Result<Option<Vec<String>>, CoreError> {
        SchemaRepo::find(&self.pool, project_id, kind)
            .await
            .map_err(db_error)
    }

    async fn insert_tasks(
        &self,
        project_id: DbId,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64, CoreError> {
        let payloads: Vec<serde_json::Value> = rows.iter().map(row_to_json).collect();
        TaskRepo::insert_batch(&self.pool, project_id, columns, &payloads)
            .await
            .map_err(db_error)?
            .ok_or_else(|| schema_changed(SchemaKind::Task))
    }

    async fn find_task(
        &self,
        project_id: DbId,
        task_id: DbId,
    ) -> Result<Option<TaskRecord>, CoreError> {
        let row = TaskRepo::find_by_id(&self.pool, project_id, task_id)
            .await
            .map_err(db_error)?;
        self.to_record_opt(project_id, row).await
    }

    async fn find_claimed_by(
        &self,
        project_id: DbId,
        worker_id: &str,
    ) -> Result<Option<TaskRecord>, CoreError> {
        let row = TaskRepo::find_claimed_by(&self.pool, project_id, worker_id)
            .await
            .map_err(db_error)?;
        self.to_record_opt(project_id, row).await
    }

    async fn claim_candidates(
        &self,
        project_id: DbId,
        lease: Option<Duration>,
        limit: usize,
    ) -> Result<Vec<DbId>, CoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        TaskRepo::claim_candidates(&self.pool, project_id, lease, limit)
            .await
            .map_err(db_error)
    }

    async fn try_claim(
        &self,
        project_id: DbId,
        task_id: DbId,
        worker_id: &str,
        lease: Option<Duration>,
    ) -> Result<Option<TaskRecord>, CoreError> {
        let row = TaskRepo::try_claim(&self.pool, project_id, task_id, worker_id, lease)
            .await
            .map_err(db_error)?;
        self.to_record_opt(project_id, row).await
    }

    /// Single-statement claim; skips rows other transactions hold locked.
    async fn claim_next(
        &self,
        project_id: DbId,
        worker_id: &str,
        lease: Option<Duration>,
    ) -> Result<Option<TaskRecord>, CoreError> {
        let row = TaskRepo::claim_next(&self.pool, project_id, worker_id, lease)
            .await
            .map_err(db_error)?;
        self.to_record_opt(project_id, row).await
    }

    async fn complete_task(
        &self,
        project_id: DbId,
        task_id: DbId,
        columns: &[String],
        row: &Row,
    ) -> Result<Transition<ResultRecord>, CoreError> {
        let completion =
            TaskRepo::complete(&self.pool, project_id, task_id, columns, &row_to_json(row))
                .await
                .map_err(db_error)?;

        match completion {
            Completion::Stored(result) => Ok(Transition::Applied(ResultRecord {
                id: result.id,
                task_id,
                data: row.clone(),
            })),
            Completion::NotClaimed => self.missed(project_id, task_id).await,
            Completion::SchemaChanged => Err(schema_changed(SchemaKind::Result)),
        }
    }

    async fn fail_task(
        &self,
        project_id: DbId,
        task_id: DbId,
        note: Option<&str>,
        policy: &QueuePolicy,
    ) -> Result<Transition<FailureOutcome>, CoreError> {
        let max_retries = policy
            .max_retries
            .map(|n| i32::try_from(n).unwrap_or(i32::MAX));

        match TaskRepo::fail(&self.pool, project_id, task_id, note, max_retries)
            .await
            .map_err(db_error)?
        {
            Some((status_id, retry_count)) => Ok(Transition::Applied(FailureOutcome {
                status: task_status(status_id)?,
                retry_count,
            })),
            None => self.missed(project_id, task_id).await,
        }
    }

    async fn task_counts(&self, project_id: DbId) -> Result<TaskCounts, CoreError> {
        let row = TaskRepo::counts(&self.pool, project_id)
            .await
            .map_err(db_error)?;
        Ok(TaskCounts {
            total: row.total,
            done: row.done,
        })
    }

    async fn result_count(&self, project_id: DbId) -> Result<i64, CoreError> {
        ResultRepo::count(&self.pool, project_id)
            .await
            .map_err(db_error)
    }
}
