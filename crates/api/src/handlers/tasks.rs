//! Handlers for the `/projects/{project_id}/tasks` resource.
//!
//! Workers and operators call these without authentication; the caller's
//! identity is the opaque `worker_id` on the claim endpoint.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crawlq_core::payload::{ColumnarBatch, ResultPayload};
use crawlq_core::record::ClaimedTask;
use crawlq_core::types::DbId;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::query::ClaimParams;
use crate::response::{AppendResponse, DataResponse, FailureResponse, MessageResponse};
use crate::state::AppState;

/// Request body for the two table-definition endpoints.
#[derive(Debug, Deserialize)]
pub struct DefineColumns {
    pub columns: Vec<String>,
}

/// Optional body of a failure report.
#[derive(Debug, Default, Deserialize)]
pub struct FailureReport {
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/tasks/table
///
/// (Re)create the task store. Existing tasks are discarded.
pub async fn define_task_table(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<DefineColumns>,
) -> AppResult<Json<MessageResponse>> {
    state
        .queue
        .define_task_schema(project_id, &input.columns)
        .await?;
    Ok(Json(MessageResponse::new("Task table initialized.")))
}

/// POST /api/v1/projects/{project_id}/tasks/results/table
///
/// (Re)create the result store. Existing results are discarded.
pub async fn define_result_table(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<DefineColumns>,
) -> AppResult<Json<MessageResponse>> {
    state
        .queue
        .define_result_schema(project_id, &input.columns)
        .await?;
    Ok(Json(MessageResponse::new("Result table initialized.")))
}

/// GET /api/v1/projects/{project_id}/tasks/columns
pub async fn task_columns(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.queue.task_columns(project_id).await?))
}

/// GET /api/v1/projects/{project_id}/tasks/results/columns
pub async fn result_columns(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.queue.result_columns(project_id).await?))
}

/// GET /api/v1/projects/{project_id}/tasks/schema
///
/// Both column lists in one call: `{ task_columns, result_columns }`.
pub async fn table_structure(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.queue.table_structure(project_id).await?))
}

// ---------------------------------------------------------------------------
// Append
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/tasks
///
/// Append a columnar batch (`{ "col": [v1, v2, ...], ... }`). All rows are
/// inserted or none. Returns 201.
pub async fn append_tasks(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(batch): Json<ColumnarBatch>,
) -> AppResult<impl IntoResponse> {
    let inserted_count = state.queue.append_tasks(project_id, &batch).await?;

    Ok((
        StatusCode::CREATED,
        Json(AppendResponse {
            message: "Tasks appended.".to_string(),
            inserted_count,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{project_id}/tasks/next?worker_id=W
///
/// Claim the oldest claimable task. 200 with `{ id, data }`, or 204 when
/// there is nothing to do.
pub async fn claim_next(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(params): Query<ClaimParams>,
) -> AppResult<Response> {
    match state.queue.claim_next(project_id, &params.worker_id).await? {
        Some(task) => Ok(Json(ClaimedTask::from(task)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// GET /api/v1/projects/{project_id}/tasks/{task_id}
///
/// Full task record including system fields.
pub async fn get_task(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let task = state.queue.get_task(project_id, task_id).await?;
    Ok(Json(DataResponse { data: task }))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/tasks/{task_id}/result
///
/// Store the result row and mark the task done.
pub async fn submit_result(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(DbId, DbId)>,
    Json(payload): Json<ResultPayload>,
) -> AppResult<Json<MessageResponse>> {
    state
        .queue
        .submit_result(project_id, task_id, &payload)
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "Result for task {task_id} submitted."
    ))))
}

/// POST /api/v1/projects/{project_id}/tasks/{task_id}/fail
///
/// Report a failed attempt. The body (`{ "error": "..." }`) is optional.
pub async fn report_failure(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(DbId, DbId)>,
    body: Bytes,
) -> AppResult<Json<FailureResponse>> {
    let report = parse_failure_report(&body)?;

    let outcome = state
        .queue
        .report_failure(project_id, task_id, report.error.as_deref())
        .await?;

    Ok(Json(FailureResponse {
        message: format!("Failure report for task {task_id} received."),
        status: outcome.status,
        retry_count: outcome.retry_count,
    }))
}

/// An empty (or whitespace-only) body is a report without a message.
fn parse_failure_report(body: &[u8]) -> AppResult<FailureReport> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(FailureReport::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid failure report body: {e}")))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{project_id}/tasks/progress
///
/// Done / total as a bare number, 4 decimals; `0.0` with no tasks.
pub async fn progress(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<f64>> {
    Ok(Json(state.queue.progress(project_id).await?))
}

/// GET /api/v1/projects/{project_id}/tasks/results/count
pub async fn result_count(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<i64>> {
    Ok(Json(state.queue.result_count(project_id).await?))
}
