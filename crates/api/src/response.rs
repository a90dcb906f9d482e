//! Response body types for API handlers.
//!
//! Queue endpoints answer with flat bodies (`{ "message": ... }`, bare
//! column lists, bare numbers) that existing workers already parse.
//! Inspection endpoints use the `{ "data": ... }` envelope.

use crawlq_core::status::TaskStatus;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "message": ... }` acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of a successful batch append.
#[derive(Debug, Serialize)]
pub struct AppendResponse {
    pub message: String,
    pub inserted_count: u64,
}

/// Body of an accepted failure report: where the task went.
#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub message: String,
    pub status: TaskStatus,
    pub retry_count: i32,
}
