//! Repository for the `project_schemas` table.

use crawlq_core::schema::SchemaKind;
use crawlq_core::types::DbId;
use sqlx::{PgConnection, PgPool};

/// Stores the user-defined column lists of task and result stores.
pub struct SchemaRepo;

impl SchemaRepo {
    /// Record `columns` as the project's `kind` schema and discard every row
    /// of that store, in one transaction.
    ///
    /// The schema row is written first: its row lock waits out writers
    /// holding [`SchemaRepo::find_for_share`], so the delete sees their rows.
    pub async fn replace(
        pool: &PgPool,
        project_id: DbId,
        kind: SchemaKind,
        columns: &[String],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO project_schemas (project_id, kind, columns)
             VALUES ($1, $2, $3)
             ON CONFLICT (project_id, kind) DO UPDATE SET columns = EXCLUDED.columns",
        )
        .bind(project_id)
        .bind(kind.as_str())
        .bind(columns)
        .execute(&mut *tx)
        .await?;

        let table = match kind {
            SchemaKind::Task => "tasks",
            SchemaKind::Result => "task_results",
        };
        sqlx::query(&format!("DELETE FROM {table} WHERE project_id = $1"))
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    /// The store's columns, read with `FOR SHARE` so a concurrent
    /// [`SchemaRepo::replace`] cannot commit until the caller's
    /// transaction ends.
    pub async fn find_for_share(
        conn: &mut PgConnection,
        project_id: DbId,
        kind: SchemaKind,
    ) -> Result<Option<Vec<String>>, sqlx::Error> {
        sqlx::query_scalar::<_, Vec<String>>(
            "SELECT columns FROM project_schemas
             WHERE project_id = $1 AND kind = $2
             FOR SHARE",
        )
        .bind(project_id)
        .bind(kind.as_str())
        .fetch_optional(&mut *conn)
        .await
    }

    /// The store's columns, or `None` if it was never initialized.
    pub async fn find(
        pool: &PgPool,
        project_id: DbId,
        kind: SchemaKind,
    ) -> Result<Option<Vec<String>>, sqlx::Error> {
        sqlx::query_scalar::<_, Vec<String>>(
            "SELECT columns FROM project_schemas WHERE project_id = $1 AND kind = $2",
        )
        .bind(project_id)
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await
    }
}
