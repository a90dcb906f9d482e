//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use crawlq_api::error::AppError;
use crawlq_core::error::CoreError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: NotFound maps to 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Task",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Task with id 42 not found");
}

// ---------------------------------------------------------------------------
// Test: schema and batch errors map to 400 with distinct codes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn schema_errors_return_400_with_specific_codes() {
    let cases = [
        (CoreError::InvalidSchema("reserved".into()), "INVALID_SCHEMA"),
        (CoreError::SchemaMismatch("unknown column".into()), "SCHEMA_MISMATCH"),
        (CoreError::LengthMismatch("ragged".into()), "LENGTH_MISMATCH"),
        (CoreError::Validation("empty worker_id".into()), "VALIDATION_ERROR"),
    ];

    for (err, code) in cases {
        let (status, json) = error_to_response(AppError::Core(err)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{code}");
        assert_eq!(json["code"], code);
    }
}

// ---------------------------------------------------------------------------
// Test: state errors map to 409
// ---------------------------------------------------------------------------

#[tokio::test]
async fn already_completed_returns_409() {
    let err = AppError::Core(CoreError::AlreadyCompleted { task_id: 7 });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_COMPLETED");
    assert_eq!(json["error"], "Task 7 is already completed");
}

#[tokio::test]
async fn invalid_state_returns_409() {
    let err = AppError::Core(CoreError::InvalidState("Task 7 is pending".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_STATE");
    assert_eq!(json["error"], "Task 7 is pending");
}

// ---------------------------------------------------------------------------
// Test: BadRequest maps to 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("invalid field value".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "invalid field value");
}

// ---------------------------------------------------------------------------
// Test: internal errors are sanitized
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_error_hides_details() {
    let err = AppError::Core(CoreError::Internal("connection refused at 10.0.0.5".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
