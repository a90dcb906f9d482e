//! Repository for the `projects` table.

use crawlq_core::types::DbId;
use sqlx::PgPool;

use crate::models::project::ProjectRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, status_id, settings, created_at, updated_at";

/// Read access to projects, plus the insert the seeding tools and tests
/// need.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new active project, returning the created row.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        settings: Option<&serde_json::Value>,
    ) -> Result<ProjectRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (name, settings)
             VALUES ($1, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(name)
            .bind(settings)
            .fetch_one(pool)
            .await
    }

    /// Find a project by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ProjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
