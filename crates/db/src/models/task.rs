//! Task row model.

use crawlq_core::record::{row_in_schema_order, TaskRecord};
use crawlq_core::status::{StatusId, TaskStatus};
use crawlq_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: DbId,
    pub project_id: DbId,
    pub status_id: StatusId,
    pub worker_id: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub retry_count: i32,
    pub note: Option<String>,
    pub data: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TaskRow {
    /// Convert to the core record, laying `data` out in `columns` order.
    /// `None` if `status_id` is not a known task status.
    pub fn into_record(self, columns: &[String]) -> Option<TaskRecord> {
        Some(TaskRecord {
            id: self.id,
            status: TaskStatus::from_id(self.status_id)?,
            worker_id: self.worker_id,
            claimed_at: self.claimed_at,
            retry_count: self.retry_count,
            note: self.note,
            data: row_in_schema_order(columns, &self.data),
        })
    }
}

/// Per-status task counts of one project.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct TaskCountRow {
    pub total: i64,
    pub done: i64,
}
