//! Task result row model.

use crawlq_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `task_results` table.
#[derive(Debug, Clone, FromRow)]
pub struct TaskResultRow {
    pub id: DbId,
    pub project_id: DbId,
    /// Nulled once the producing task is discarded by a schema redefinition.
    pub task_id: Option<DbId>,
    pub data: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
