//! Claim eligibility and the scan-and-compare-and-set dispatch loop.

use std::time::Duration;

use chrono::Utc;

use crate::error::CoreError;
use crate::record::TaskRecord;
use crate::status::TaskStatus;
use crate::types::{DbId, Timestamp};

use super::QueueStore;

/// How many FIFO candidates one scan fetches before compare-and-setting.
pub const CLAIM_SCAN_WINDOW: usize = 16;

/// Claims at or before this instant have expired under `lease`.
pub fn lease_cutoff(lease: Option<Duration>, now: Timestamp) -> Option<Timestamp> {
    let lease = chrono::Duration::from_std(lease?).ok()?;
    now.checked_sub_signed(lease)
}

/// Whether `task` may be handed to a new worker given the lease cutoff.
pub fn is_claimable(task: &TaskRecord, cutoff: Option<Timestamp>) -> bool {
    match task.status {
        TaskStatus::Pending => true,
        TaskStatus::Claimed => matches!(
            (cutoff, task.claimed_at),
            (Some(cutoff), Some(claimed_at)) if claimed_at <= cutoff
        ),
        TaskStatus::Done | TaskStatus::Failed => false,
    }
}

/// Claim the oldest claimable task by scanning FIFO candidates and trying a
/// per-row compare-and-set on each.
///
/// A worker still holding a claim (e.g. after restarting with the same id)
/// gets that task back before anything new is claimed.
///
/// A lost compare-and-set means a concurrent caller took that row; the
/// loop moves on to the next candidate, and rescans once the window is
/// exhausted. Returns `None` only when a scan finds no candidates at all.
pub async fn claim_by_scan<S>(
    store: &S,
    project_id: DbId,
    worker_id: &str,
    lease: Option<Duration>,
) -> Result<Option<TaskRecord>, CoreError>
where
    S: QueueStore + ?Sized,
{
    if let Some(task) = store.find_claimed_by(project_id, worker_id).await? {
        tracing::debug!(project_id, task_id = task.id, worker_id, "Re-delivering held claim");
        return Ok(Some(task));
    }

    loop {
        let candidates = store
            .claim_candidates(project_id, lease, CLAIM_SCAN_WINDOW)
            .await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        for task_id in candidates {
            if let Some(task) = store.try_claim(project_id, task_id, worker_id, lease).await? {
                return Ok(Some(task));
            }
            tracing::debug!(project_id, task_id, worker_id, "Lost claim race, trying next candidate");
        }
    }
}
