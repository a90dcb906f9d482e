//! Route definitions for the per-project task queue.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/projects/{project_id}/tasks`.
///
/// ```text
/// POST   /                        -> append_tasks
/// POST   /table                   -> define_task_table
/// GET    /columns                 -> task_columns
/// GET    /schema                  -> table_structure
/// GET    /progress                -> progress
/// GET    /next?worker_id=W        -> claim_next
/// POST   /results/table           -> define_result_table
/// GET    /results/columns         -> result_columns
/// GET    /results/count           -> result_count
/// GET    /{task_id}               -> get_task
/// POST   /{task_id}/result        -> submit_result
/// POST   /{task_id}/fail          -> report_failure
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(tasks::append_tasks))
        .route("/table", post(tasks::define_task_table))
        .route("/columns", get(tasks::task_columns))
        .route("/schema", get(tasks::table_structure))
        .route("/progress", get(tasks::progress))
        .route("/next", get(tasks::claim_next))
        .route("/results/table", post(tasks::define_result_table))
        .route("/results/columns", get(tasks::result_columns))
        .route("/results/count", get(tasks::result_count))
        .route("/{task_id}", get(tasks::get_task))
        .route("/{task_id}/result", post(tasks::submit_result))
        .route("/{task_id}/fail", post(tasks::report_failure))
}
