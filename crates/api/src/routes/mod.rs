pub mod health;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /projects/{project_id}/tasks                     append
/// /projects/{project_id}/tasks/table               define task table
/// /projects/{project_id}/tasks/columns             task columns
/// /projects/{project_id}/tasks/schema              both column lists
/// /projects/{project_id}/tasks/progress            completion ratio
/// /projects/{project_id}/tasks/next                claim next task
/// /projects/{project_id}/tasks/results/table       define result table
/// /projects/{project_id}/tasks/results/columns     result columns
/// /projects/{project_id}/tasks/results/count       result count
/// /projects/{project_id}/tasks/{task_id}           inspect task
/// /projects/{project_id}/tasks/{task_id}/result    submit result
/// /projects/{project_id}/tasks/{task_id}/fail      report failure
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/projects/{project_id}/tasks", tasks::router())
}
