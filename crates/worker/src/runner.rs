//! The claim / work / report loop.

use std::sync::Arc;
use std::time::Duration;

use crawlq_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, TaskClient};
use crate::handler::TaskHandler;

/// Default wait between claims while the queue is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What one iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to claim.
    Idle,
    /// The handler succeeded and the result was accepted.
    Completed(DbId),
    /// The handler failed and the failure was reported.
    Failed(DbId),
}

/// Running totals for one loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub failed: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Completed(_) => self.completed += 1,
            StepOutcome::Failed(_) => self.failed += 1,
            StepOutcome::Idle => {}
        }
    }
}

/// A single worker: claims tasks one at a time, hands them to a
/// [`TaskHandler`], and reports the outcome.
pub struct WorkerLoop {
    client: TaskClient,
    handler: Arc<dyn TaskHandler>,
    worker_id: String,
    poll_interval: Duration,
}

impl WorkerLoop {
    pub fn new(client: TaskClient, handler: Arc<dyn TaskHandler>, worker_id: String) -> Self {
        Self {
            client,
            handler,
            worker_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Claim and process at most one task.
    ///
    /// A result the server rejects (4xx) is reported as a failure so the
    /// claim is released. Transport errors propagate with the claim still
    /// held; the next claim by this worker id hands the same task back.
    pub async fn run_once(&self) -> Result<StepOutcome, ClientError> {
        let Some(task) = self.client.claim_next(&self.worker_id).await? else {
            return Ok(StepOutcome::Idle);
        };
        let task_id = task.id;
        tracing::debug!(task_id, worker_id = %self.worker_id, "Claimed task");

        let message = match self.handler.handle(&task).await {
            Ok(payload) => match self.client.submit_result(task_id, &payload).await {
                Ok(()) => {
                    tracing::info!(task_id, worker_id = %self.worker_id, "Task completed");
                    return Ok(StepOutcome::Completed(task_id));
                }
                Err(e) if e.is_rejection() => format!("Result rejected: {e}"),
                Err(e) => return Err(e),
            },
            Err(e) => e.to_string(),
        };

        let ack = self.client.report_failure(task_id, Some(&message)).await?;
        tracing::warn!(
            task_id,
            worker_id = %self.worker_id,
            error = %message,
            status = %ack.status,
            retry_count = ack.retry_count,
            "Task failed",
        );
        Ok(StepOutcome::Failed(task_id))
    }

    /// Process tasks until the queue reports nothing to claim.
    pub async fn run_until_idle(&self) -> Result<WorkerStats, ClientError> {
        let mut stats = WorkerStats::default();
        loop {
            let outcome = self.run_once().await?;
            if outcome == StepOutcome::Idle {
                return Ok(stats);
            }
            stats.record(outcome);
        }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// Sleeps `poll_interval` while the queue is empty or the server is
    /// unreachable; otherwise claims the next task immediately. A task in
    /// flight when the token fires is finished and reported first.
    pub async fn run(&self, cancel: CancellationToken) -> WorkerStats {
        let mut stats = WorkerStats::default();
        tracing::info!(
            worker_id = %self.worker_id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Worker loop started",
        );

        while !cancel.is_cancelled() {
            let wait = match self.run_once().await {
                Ok(StepOutcome::Idle) => true,
                Ok(outcome) => {
                    stats.record(outcome);
                    false
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "Worker cycle failed");
                    true
                }
            };

            if wait {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        tracing::info!(
            worker_id = %self.worker_id,
            completed = stats.completed,
            failed = stats.failed,
            "Worker loop shutting down",
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_completions_and_failures() {
        let mut stats = WorkerStats::default();
        stats.record(StepOutcome::Completed(1));
        stats.record(StepOutcome::Failed(2));
        stats.record(StepOutcome::Completed(3));
        stats.record(StepOutcome::Idle);
        assert_eq!(stats, WorkerStats { completed: 2, failed: 1 });
    }
}
