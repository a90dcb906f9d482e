//! Repository for the `task_results` table.

use crawlq_core::types::DbId;
use sqlx::PgPool;

use crate::models::task_result::TaskResultRow;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, project_id, task_id, data, created_at, updated_at";

/// Read access to collected results. Inserts happen inside
/// [`TaskRepo::complete`](crate::repositories::TaskRepo::complete).
pub struct ResultRepo;

impl ResultRepo {
    /// Number of results stored for a project.
    pub async fn count(pool: &PgPool, project_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM task_results WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(pool)
            .await
    }

    /// The result produced by a task, if any.
    pub async fn find_by_task(
        pool: &PgPool,
        project_id: DbId,
        task_id: DbId,
    ) -> Result<Option<TaskResultRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM task_results WHERE project_id = $1 AND task_id = $2"
        );
        sqlx::query_as::<_, TaskResultRow>(&query)
            .bind(project_id)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }
}
