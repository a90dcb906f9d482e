//! The pluggable unit of work.

use async_trait::async_trait;
use crawlq_core::payload::ResultPayload;
use crawlq_core::record::ClaimedTask;

/// Error a handler reports for one task. Its text becomes the failure note.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Turns one claimed task into a result row.
///
/// Returning `Err` reports the task as failed; the queue decides whether
/// it is retried.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &ClaimedTask) -> Result<ResultPayload, HandlerError>;
}
