//! Completion accounting derived from task counts.

/// Progress ratios are reported with this many decimal places.
const RATIO_SCALE: f64 = 10_000.0;

/// Aggregate task counts for one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: i64,
    pub done: i64,
}

impl TaskCounts {
    /// Completion ratio in `0.0..=1.0`; see [`completion_ratio`].
    pub fn ratio(&self) -> f64 {
        completion_ratio(self.done, self.total)
    }
}

/// `done / total` rounded to 4 decimal places, or `0.0` when there are no
/// tasks.
pub fn completion_ratio(done: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let ratio = (done as f64 / total as f64).clamp(0.0, 1.0);
    (ratio * RATIO_SCALE).round() / RATIO_SCALE
}
