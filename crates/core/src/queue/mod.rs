//! The task queue: storage contract, engines, and the service on top.
//!
//! [`QueueStore`] is the consistency contract every storage engine must
//! honour. The rules that matter:
//!
//! - `try_claim` and `claim_next` are single atomic conditional updates.
//!   A row moves from claimable to `claimed` for exactly one caller.
//! - `complete_task` and `fail_task` re-check `status = claimed` inside the
//!   same atomic unit that applies the transition, so of two racing
//!   reports only the first one wins.
//! - `insert_tasks` and `replace_schema` are all-or-nothing.
//! - `insert_tasks` and `complete_task` re-check the schema their rows were
//!   built against in the same atomic unit as the write, so a concurrent
//!   redefinition never receives rows of the old shape.
//!
//! [`TaskQueue`] layers validation and policy on top and is what the HTTP
//! handlers call.

pub mod dispatch;
pub mod memory;
pub mod service;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::policy::QueuePolicy;
use crate::progress::TaskCounts;
use crate::record::{FailureOutcome, Project, ResultRecord, Row, TaskRecord};
use crate::schema::SchemaKind;
use crate::status::TaskStatus;
use crate::types::DbId;

pub use memory::MemoryQueueStore;
pub use service::{TableStructure, TaskQueue};

/// Result of a conditional single-task transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    /// The task was `claimed` and the transition was applied.
    Applied(T),
    /// No task with that id exists in the project.
    NotFound,
    /// The task exists but was not `claimed`; carries its current status.
    WrongState(TaskStatus),
}

/// Storage engine contract for per-project task and result stores.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Cheap round trip proving the engine is reachable.
    async fn health_check(&self) -> Result<(), CoreError>;

    async fn find_project(&self, project_id: DbId) -> Result<Option<Project>, CoreError>;

    /// Drop every record in the project's `kind` store and record `columns`
    /// as its new schema, atomically.
    async fn replace_schema(
        &self,
        project_id: DbId,
        kind: SchemaKind,
        columns: &[String],
    ) -> Result<(), CoreError>;

    /// The defined columns, or `None` if the store was never initialized.
    async fn find_schema(
        &self,
        project_id: DbId,
        kind: SchemaKind,
    ) -> Result<Option<Vec<String>>, CoreError>;

    /// Insert `rows` as new pending tasks. Inserts all or none.
    ///
    /// `columns` is the task schema the rows were built against; if the
    /// stored schema differs when the insert applies, nothing is written
    /// and [`crate::schema::schema_changed`] is returned.
    async fn insert_tasks(
        &self,
        project_id: DbId,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64, CoreError>;

    async fn find_task(
        &self,
        project_id: DbId,
        task_id: DbId,
    ) -> Result<Option<TaskRecord>, CoreError>;

    /// The oldest task currently `claimed` by `worker_id`, if any.
    async fn find_claimed_by(
        &self,
        project_id: DbId,
        worker_id: &str,
    ) -> Result<Option<TaskRecord>, CoreError>;

    /// Up to `limit` claimable task ids in FIFO order.
    ///
    /// Claimable means `pending`, or `claimed` with a `claimed_at` at least
    /// `lease` old when a lease is set. This is a snapshot: by the time the
    /// caller acts on it, other callers may have taken some of the rows.
    async fn claim_candidates(
        &self,
        project_id: DbId,
        lease: Option<Duration>,
        limit: usize,
    ) -> Result<Vec<DbId>, CoreError>;

    /// Compare-and-set one row to `claimed` for `worker_id`.
    ///
    /// Returns `None` when the row is no longer claimable (another caller
    /// won it, or it left the claimable set).
    async fn try_claim(
        &self,
        project_id: DbId,
        task_id: DbId,
        worker_id: &str,
        lease: Option<Duration>,
    ) -> Result<Option<TaskRecord>, CoreError>;

    /// Atomically claim the oldest claimable task for `worker_id`.
    ///
    /// A worker that already holds a claim gets that task back unchanged
    /// instead of a new one. The default scans candidates and
    /// compare-and-sets them one by one; engines with a native
    /// single-statement claim override it.
    async fn claim_next(
        &self,
        project_id: DbId,
        worker_id: &str,
        lease: Option<Duration>,
    ) -> Result<Option<TaskRecord>, CoreError> {
        dispatch::claim_by_scan(self, project_id, worker_id, lease).await
    }

    /// Insert `row` into the result store and move the task `claimed -> done`
    /// in one atomic unit.
    ///
    /// `columns` is the result schema `row` was built against; the task
    /// state is checked first, then the schema, as with `insert_tasks`.
    async fn complete_task(
        &self,
        project_id: DbId,
        task_id: DbId,
        columns: &[String],
        row: &Row,
    ) -> Result<Transition<ResultRecord>, CoreError>;

    /// Record a failure on a `claimed` task: bump `retry_count`, store
    /// `note`, release the claim, and re-queue or fail it per `policy`.
    async fn fail_task(
        &self,
        project_id: DbId,
        task_id: DbId,
        note: Option<&str>,
        policy: &QueuePolicy,
    ) -> Result<Transition<FailureOutcome>, CoreError>;

    async fn task_counts(&self, project_id: DbId) -> Result<TaskCounts, CoreError>;

    async fn result_count(&self, project_id: DbId) -> Result<i64, CoreError>;
}
