//! Record types shared by the storage engines and the HTTP layer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::status::{ProjectStatus, TaskStatus};
use crate::types::{DbId, Timestamp};

/// One record's user-defined columns, in schema order.
pub type Row = IndexMap<String, serde_json::Value>;

/// The slice of a project the queue needs: identity, status and settings.
///
/// Projects are owned by the surrounding project service; this core only
/// reads them.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub status: ProjectStatus,
    /// Opaque settings blob. The queue reads `max_retries` and `lease_secs`.
    pub settings: Option<serde_json::Value>,
}

/// A task with its system-owned fields and payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: DbId,
    pub status: TaskStatus,
    pub worker_id: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub retry_count: i32,
    /// Last failure reason, if any.
    pub note: Option<String>,
    pub data: Row,
}

/// The wire shape handed to a worker by `claim_next`: `{ id, data }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimedTask {
    pub id: DbId,
    pub data: Row,
}

impl From<TaskRecord> for ClaimedTask {
    fn from(task: TaskRecord) -> Self {
        Self {
            id: task.id,
            data: task.data,
        }
    }
}

/// A row of the result store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: DbId,
    /// Informational back-reference to the task that produced this result.
    pub task_id: DbId,
    pub data: Row,
}

/// Outcome of a failure report: where the task went and how often it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailureOutcome {
    pub status: TaskStatus,
    pub retry_count: i32,
}

/// Project a stored JSON object onto `columns`, in order.
///
/// Columns missing from `stored` come back as `null`; keys not in
/// `columns` are dropped.
pub fn row_in_schema_order(columns: &[String], stored: &serde_json::Value) -> Row {
    columns
        .iter()
        .map(|col| {
            let value = stored.get(col).cloned().unwrap_or(serde_json::Value::Null);
            (col.clone(), value)
        })
        .collect()
}
