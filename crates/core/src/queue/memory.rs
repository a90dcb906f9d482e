//! In-process storage engine.
//!
//! Each project's stores live behind their own `tokio::sync::Mutex`; one
//! lock acquisition is one atomic storage step. The dispatcher never holds
//! a lock across steps: it reads a candidate window, releases, then
//! compare-and-sets rows one at a time, exactly as it would against a
//! remote store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::error::CoreError;
use crate::policy::QueuePolicy;
use crate::progress::TaskCounts;
use crate::record::{FailureOutcome, Project, ResultRecord, Row, TaskRecord};
use crate::schema::{schema_changed, SchemaKind};
use crate::status::{ProjectStatus, TaskStatus};
use crate::types::DbId;

use super::dispatch::{is_claimable, lease_cutoff};
use super::{QueueStore, Transition};

/// Everything the engine holds for one project.
#[derive(Debug)]
struct ProjectData {
    project: Project,
    task_schema: Option<Vec<String>>,
    result_schema: Option<Vec<String>>,
    /// Keyed by id, so iteration order is insertion (FIFO) order.
    tasks: BTreeMap<DbId, TaskRecord>,
    results: Vec<ResultRecord>,
}

/// Memory-backed [`QueueStore`] for tests and single-process deployments.
#[derive(Debug)]
pub struct MemoryQueueStore {
    projects: RwLock<HashMap<DbId, Arc<Mutex<ProjectData>>>>,
    next_project_id: AtomicI64,
    next_task_id: AtomicI64,
    next_result_id: AtomicI64,
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            next_project_id: AtomicI64::new(1),
            next_task_id: AtomicI64::new(1),
            next_result_id: AtomicI64::new(1),
        }
    }

    /// Register an active project. Stands in for the external project
    /// service, which owns project creation.
    pub async fn create_project(&self, name: &str, settings: Option<serde_json::Value>) -> Project {
        let project = Project {
            id: self.next_project_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            status: ProjectStatus::Active,
            settings,
        };
        let data = ProjectData {
            project: project.clone(),
            task_schema: None,
            result_schema: None,
            tasks: BTreeMap::new(),
            results: Vec::new(),
        };
        self.projects
            .write()
            .await
            .insert(project.id, Arc::new(Mutex::new(data)));
        project
    }

    /// Change a project's lifecycle status. Returns `false` if unknown.
    pub async fn set_project_status(&self, project_id: DbId, status: ProjectStatus) -> bool {
        match self.slot(project_id).await {
            Some(slot) => {
                slot.lock().await.project.status = status;
                true
            }
            None => false,
        }
    }

    async fn slot(&self, project_id: DbId) -> Option<Arc<Mutex<ProjectData>>> {
        self.projects.read().await.get(&project_id).cloned()
    }

    async fn require_slot(&self, project_id: DbId) -> Result<Arc<Mutex<ProjectData>>, CoreError> {
        self.slot(project_id).await.ok_or(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        })
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn health_check(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn find_project(&self, project_id: DbId) -> Result<Option<Project>, CoreError> {
        match self.slot(project_id).await {
            Some(slot) => Ok(Some(slot.lock().await.project.clone())),
            None => Ok(None),
        }
    }

    async fn replace_schema(
        &self,
        project_id: DbId,
        kind: SchemaKind,
        columns: &[String],
    ) -> Result<(), CoreError> {
        let slot = self.require_slot(project_id).await?;
        let mut data = slot.lock().await;
        match kind {
            SchemaKind::Task => {
                data.tasks.clear();
                data.task_schema = Some(columns.to_vec());
            }
            SchemaKind::Result => {
                data.results.clear();
                data.result_schema = Some(columns.to_vec());
            }
        }
        Ok(())
    }

    async fn find_schema(
        &self,
        project_id: DbId,
        kind: SchemaKind,
    ) -> Result<Option<Vec<String>>, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let data = slot.lock().await;
        Ok(match kind {
            SchemaKind::Task => data.task_schema.clone(),
            SchemaKind::Result => data.result_schema.clone(),
        })
    }

    async fn insert_tasks(
        &self,
        project_id: DbId,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let mut data = slot.lock().await;
        if data.task_schema.as_deref() != Some(columns) {
            return Err(schema_changed(SchemaKind::Task));
        }
        for row in rows {
            let id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
            data.tasks.insert(
                id,
                TaskRecord {
                    id,
                    status: TaskStatus::Pending,
                    worker_id: None,
                    claimed_at: None,
                    retry_count: 0,
                    note: None,
                    data: row.clone(),
                },
            );
        }
        Ok(rows.len() as u64)
    }

    async fn find_task(
        &self,
        project_id: DbId,
        task_id: DbId,
    ) -> Result<Option<TaskRecord>, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let data = slot.lock().await;
        Ok(data.tasks.get(&task_id).cloned())
    }

    async fn find_claimed_by(
        &self,
        project_id: DbId,
        worker_id: &str,
    ) -> Result<Option<TaskRecord>, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let data = slot.lock().await;
        Ok(data
            .tasks
            .values()
            .find(|task| {
                task.status == TaskStatus::Claimed && task.worker_id.as_deref() == Some(worker_id)
            })
            .cloned())
    }

    async fn claim_candidates(
        &self,
        project_id: DbId,
        lease: Option<Duration>,
        limit: usize,
    ) -> Result<Vec<DbId>, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let data = slot.lock().await;
        let cutoff = lease_cutoff(lease, Utc::now());
        Ok(data
            .tasks
            .values()
            .filter(|task| is_claimable(task, cutoff))
            .map(|task| task.id)
            .take(limit)
            .collect())
    }

    async fn try_claim(
        &self,
        project_id: DbId,
        task_id: DbId,
        worker_id: &str,
        lease: Option<Duration>,
    ) -> Result<Option<TaskRecord>, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let mut data = slot.lock().await;
        let now = Utc::now();
        let cutoff = lease_cutoff(lease, now);

        let Some(task) = data.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if !is_claimable(task, cutoff) {
            return Ok(None);
        }

        task.status = TaskStatus::Claimed;
        task.worker_id = Some(worker_id.to_string());
        task.claimed_at = Some(now);
        Ok(Some(task.clone()))
    }

    async fn complete_task(
        &self,
        project_id: DbId,
        task_id: DbId,
        columns: &[String],
        row: &Row,
    ) -> Result<Transition<ResultRecord>, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let mut data = slot.lock().await;

        let Some(status) = data.tasks.get(&task_id).map(|task| task.status) else {
            return Ok(Transition::NotFound);
        };
        if status != TaskStatus::Claimed {
            return Ok(Transition::WrongState(status));
        }
        if data.result_schema.as_deref() != Some(columns) {
            return Err(schema_changed(SchemaKind::Result));
        }
        if let Some(task) = data.tasks.get_mut(&task_id) {
            task.status = TaskStatus::Done;
        }

        let record = ResultRecord {
            id: self.next_result_id.fetch_add(1, Ordering::SeqCst),
            task_id,
            data: row.clone(),
        };
        data.results.push(record.clone());
        Ok(Transition::Applied(record))
    }

    async fn fail_task(
        &self,
        project_id: DbId,
        task_id: DbId,
        note: Option<&str>,
        policy: &QueuePolicy,
    ) -> Result<Transition<FailureOutcome>, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let mut data = slot.lock().await;

        let Some(task) = data.tasks.get_mut(&task_id) else {
            return Ok(Transition::NotFound);
        };
        if task.status != TaskStatus::Claimed {
            return Ok(Transition::WrongState(task.status));
        }

        task.retry_count += 1;
        task.status = policy.status_after_failure(task.retry_count);
        task.note = note.map(str::to_string);
        task.worker_id = None;
        task.claimed_at = None;

        Ok(Transition::Applied(FailureOutcome {
            status: task.status,
            retry_count: task.retry_count,
        }))
    }

    async fn task_counts(&self, project_id: DbId) -> Result<TaskCounts, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let data = slot.lock().await;
        let done = data
            .tasks
            .values()
            .filter(|task| task.status == TaskStatus::Done)
            .count();
        Ok(TaskCounts {
            total: data.tasks.len() as i64,
            done: done as i64,
        })
    }

    async fn result_count(&self, project_id: DbId) -> Result<i64, CoreError> {
        let slot = self.require_slot(project_id).await?;
        let data = slot.lock().await;
        Ok(data.results.len() as i64)
    }
}
