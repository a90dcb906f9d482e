//! Query parameter types for API handlers.

use serde::Deserialize;

/// `?worker_id=` on the claim endpoint.
#[derive(Debug, Deserialize)]
pub struct ClaimParams {
    pub worker_id: String,
}
