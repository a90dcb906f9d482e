//! Project row model.

use crawlq_core::record::Project;
use crawlq_core::status::{ProjectStatus, StatusId};
use crawlq_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectRow {
    pub id: DbId,
    pub name: String,
    pub status_id: StatusId,
    pub settings: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProjectRow {
    /// Convert to the core record. `None` if `status_id` is not a known
    /// project status.
    pub fn into_project(self) -> Option<Project> {
        Some(Project {
            id: self.id,
            name: self.name,
            status: ProjectStatus::from_id(self.status_id)?,
            settings: self.settings,
        })
    }
}
