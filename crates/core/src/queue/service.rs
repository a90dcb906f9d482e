//! The task queue service: schema manager, batch loader, dispatcher,
//! result collector, failure handler, and progress accountant over a
//! [`QueueStore`].
//!
//! Every operation validates fully before it mutates anything. The service
//! holds no state of its own beyond the store handle and policy defaults,
//! so any number of instances can serve the same store.

use std::sync::Arc;

use serde::Serialize;

use crate::error::CoreError;
use crate::payload::{self, ColumnarBatch, ResultPayload};
use crate::policy::QueuePolicy;
use crate::record::{FailureOutcome, Project, ResultRecord, TaskRecord};
use crate::schema::{self, SchemaKind};
use crate::status::{ProjectStatus, TaskStatus};
use crate::types::DbId;

use super::{QueueStore, Transition};

/// Both user-defined column lists of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStructure {
    pub task_columns: Vec<String>,
    pub result_columns: Vec<String>,
}

/// Project-scoped queue operations over a shared store.
#[derive(Clone)]
pub struct TaskQueue {
    store: Arc<dyn QueueStore>,
    defaults: QueuePolicy,
}

impl TaskQueue {
    pub fn new(store: Arc<dyn QueueStore>, defaults: QueuePolicy) -> Self {
        Self { store, defaults }
    }

    /// The underlying storage engine.
    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Project lookup
    // -----------------------------------------------------------------------

    async fn project(&self, project_id: DbId) -> Result<Project, CoreError> {
        self.store
            .find_project(project_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Project",
                id: project_id,
            })
    }

    /// Mutations and claims are only accepted on active projects.
    async fn active_project(&self, project_id: DbId) -> Result<Project, CoreError> {
        let project = self.project(project_id).await?;
        if project.status != ProjectStatus::Active {
            return Err(CoreError::InvalidState(format!(
                "Project {project_id} is {}",
                project.status
            )));
        }
        Ok(project)
    }

    async fn require_task(&self, project_id: DbId, task_id: DbId) -> Result<TaskRecord, CoreError> {
        self.store
            .find_task(project_id, task_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Task",
                id: task_id,
            })
    }

    // -----------------------------------------------------------------------
    // Schema manager
    // -----------------------------------------------------------------------

    /// (Re)create the task store with `columns`. Existing tasks are discarded.
    pub async fn define_task_schema(
        &self,
        project_id: DbId,
        columns: &[String],
    ) -> Result<(), CoreError> {
        self.define_schema(project_id, SchemaKind::Task, columns).await
    }

    /// (Re)create the result store with `columns`. Existing results are
    /// discarded.
    pub async fn define_result_schema(
        &self,
        project_id: DbId,
        columns: &[String],
    ) -> Result<(), CoreError> {
        self.define_schema(project_id, SchemaKind::Result, columns).await
    }

    async fn define_schema(
        &self,
        project_id: DbId,
        kind: SchemaKind,
        columns: &[String],
    ) -> Result<(), CoreError> {
        schema::validate_columns(kind, columns)?;
        self.active_project(project_id).await?;

        tracing::info!(project_id, %kind, ?columns, "Initializing store");
        self.store.replace_schema(project_id, kind, columns).await?;
        tracing::info!(project_id, %kind, "Store initialized");
        Ok(())
    }

    /// User columns of the task store, empty if never defined.
    pub async fn task_columns(&self, project_id: DbId) -> Result<Vec<String>, CoreError> {
        self.columns(project_id, SchemaKind::Task).await
    }

    /// User columns of the result store, empty if never defined.
    pub async fn result_columns(&self, project_id: DbId) -> Result<Vec<String>, CoreError> {
        self.columns(project_id, SchemaKind::Result).await
    }

    pub async fn table_structure(&self, project_id: DbId) -> Result<TableStructure, CoreError> {
        Ok(TableStructure {
            task_columns: self.task_columns(project_id).await?,
            result_columns: self.result_columns(project_id).await?,
        })
    }

    async fn columns(&self, project_id: DbId, kind: SchemaKind) -> Result<Vec<String>, CoreError> {
        self.project(project_id).await?;
        let columns = self.store.find_schema(project_id, kind).await?;
        if columns.is_none() {
            tracing::debug!(project_id, %kind, "Store not initialized, reporting no columns");
        }
        Ok(columns.unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Batch loader
    // -----------------------------------------------------------------------

    /// Insert one pending task per row of `batch`. Returns the row count.
    pub async fn append_tasks(
        &self,
        project_id: DbId,
        batch: &ColumnarBatch,
    ) -> Result<u64, CoreError> {
        self.active_project(project_id).await?;
        if batch.is_empty() {
            return Ok(0);
        }

        let columns = self
            .store
            .find_schema(project_id, SchemaKind::Task)
            .await?
            .ok_or_else(|| {
                CoreError::SchemaMismatch(format!(
                    "Project {project_id} has no task schema defined"
                ))
            })?;

        let rows = payload::rows_from_columns(&columns, batch)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let inserted_count = self.store.insert_tasks(project_id, &columns, &rows).await?;
        tracing::info!(project_id, inserted_count, "Tasks appended");
        Ok(inserted_count)
    }

    // -----------------------------------------------------------------------
    // Dispatcher
    // -----------------------------------------------------------------------

    /// Hand the oldest claimable task to `worker_id`, or `None` if there is
    /// nothing to do.
    pub async fn claim_next(
        &self,
        project_id: DbId,
        worker_id: &str,
    ) -> Result<Option<TaskRecord>, CoreError> {
        schema::validate_worker_id(worker_id)?;
        let project = self.active_project(project_id).await?;
        let policy = self.defaults.for_project(project.settings.as_ref());

        let claimed = self
            .store
            .claim_next(project_id, worker_id, policy.lease)
            .await?;

        match &claimed {
            Some(task) => tracing::info!(
                project_id,
                task_id = task.id,
                worker_id,
                retry_count = task.retry_count,
                "Task claimed",
            ),
            None => tracing::debug!(project_id, worker_id, "No claimable task"),
        }

        Ok(claimed)
    }

    // -----------------------------------------------------------------------
    // Result collector
    // -----------------------------------------------------------------------

    /// Store `payload` as the task's result and mark the task done.
    pub async fn submit_result(
        &self,
        project_id: DbId,
        task_id: DbId,
        payload: &ResultPayload,
    ) -> Result<ResultRecord, CoreError> {
        self.active_project(project_id).await?;

        let task = self.require_task(project_id, task_id).await?;
        ensure_claimed(task_id, task.status, true)?;

        let columns = self
            .store
            .find_schema(project_id, SchemaKind::Result)
            .await?
            .ok_or_else(|| {
                CoreError::SchemaMismatch(format!(
                    "Project {project_id} has no result schema defined"
                ))
            })?;
        let row = payload::result_row(&columns, payload)?;

        // The store re-checks `claimed` and the schema atomically; either
        // may have moved since the reads above.
        match self
            .store
            .complete_task(project_id, task_id, &columns, &row)
            .await?
        {
            Transition::Applied(record) => {
                tracing::info!(project_id, task_id, result_id = record.id, "Result submitted");
                Ok(record)
            }
            Transition::NotFound => Err(CoreError::NotFound {
                entity: "Task",
                id: task_id,
            }),
            Transition::WrongState(status) => Err(wrong_state(task_id, status, true)),
        }
    }

    // -----------------------------------------------------------------------
    // Failure handler
    // -----------------------------------------------------------------------

    /// Record a failed attempt and release the task for another try, or
    /// park it as failed once the project's retry limit is reached.
    pub async fn report_failure(
        &self,
        project_id: DbId,
        task_id: DbId,
        error_message: Option<&str>,
    ) -> Result<FailureOutcome, CoreError> {
        let project = self.active_project(project_id).await?;
        let policy = self.defaults.for_project(project.settings.as_ref());

        tracing::warn!(project_id, task_id, error = ?error_message, "Task failure reported");

        match self
            .store
            .fail_task(project_id, task_id, error_message, &policy)
            .await?
        {
            Transition::Applied(outcome) => {
                tracing::info!(
                    project_id,
                    task_id,
                    status = %outcome.status,
                    retry_count = outcome.retry_count,
                    "Task failure recorded",
                );
                Ok(outcome)
            }
            Transition::NotFound => Err(CoreError::NotFound {
                entity: "Task",
                id: task_id,
            }),
            Transition::WrongState(status) => Err(wrong_state(task_id, status, false)),
        }
    }

    // -----------------------------------------------------------------------
    // Progress accountant
    // -----------------------------------------------------------------------

    /// Fraction of the project's tasks that are done, to 4 decimals.
    pub async fn progress(&self, project_id: DbId) -> Result<f64, CoreError> {
        self.project(project_id).await?;
        let counts = self.store.task_counts(project_id).await?;
        Ok(counts.ratio())
    }

    /// Number of rows in the project's result store.
    pub async fn result_count(&self, project_id: DbId) -> Result<i64, CoreError> {
        self.project(project_id).await?;
        self.store.result_count(project_id).await
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Current record of one task, including its system fields.
    pub async fn get_task(&self, project_id: DbId, task_id: DbId) -> Result<TaskRecord, CoreError> {
        self.project(project_id).await?;
        self.require_task(project_id, task_id).await
    }
}

fn ensure_claimed(task_id: DbId, status: TaskStatus, completing: bool) -> Result<(), CoreError> {
    if status == TaskStatus::Claimed {
        Ok(())
    } else {
        Err(wrong_state(task_id, status, completing))
    }
}

/// Error for a report against a task that is not `claimed`. A second
/// result for a done task is `AlreadyCompleted`; anything else is
/// `InvalidState`.
fn wrong_state(task_id: DbId, status: TaskStatus, completing: bool) -> CoreError {
    if completing && status == TaskStatus::Done {
        CoreError::AlreadyCompleted { task_id }
    } else {
        CoreError::InvalidState(format!("Task {task_id} is {status}, expected claimed"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
