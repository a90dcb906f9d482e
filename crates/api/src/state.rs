use std::sync::Arc;

use crawlq_core::queue::TaskQueue;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Queue service over the configured storage engine.
    pub queue: Arc<TaskQueue>,
}
