//! Retry limit and claim lease policy.
//!
//! Server-wide defaults come from configuration; a project's settings blob
//! may override either knob with `max_retries` / `lease_secs`. A value of
//! `0` disables the knob.

use std::time::Duration;

use crate::status::TaskStatus;

/// Failures after which a task is parked as `failed`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Project settings key overriding the retry limit.
pub const SETTINGS_MAX_RETRIES: &str = "max_retries";

/// Project settings key overriding the claim lease, in seconds.
pub const SETTINGS_LEASE_SECS: &str = "lease_secs";

/// Resolved queue behaviour for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    /// `None` means failed tasks are re-queued forever.
    pub max_retries: Option<u32>,
    /// `None` means a claim never expires.
    pub lease: Option<Duration>,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_retries: Some(DEFAULT_MAX_RETRIES),
            lease: None,
        }
    }
}

impl QueuePolicy {
    /// Build a policy from raw limits where `0` means "disabled".
    pub fn from_limits(max_retries: u32, lease_secs: u64) -> Self {
        Self {
            max_retries: (max_retries > 0).then_some(max_retries),
            lease: (lease_secs > 0).then(|| Duration::from_secs(lease_secs)),
        }
    }

    /// Overlay a project's settings blob on top of these defaults.
    ///
    /// Keys that are present but not non-negative integers are ignored with
    /// a warning rather than failing the request.
    pub fn for_project(&self, settings: Option<&serde_json::Value>) -> Self {
        let mut policy = *self;
        let Some(settings) = settings else {
            return policy;
        };

        if let Some(raw) = settings.get(SETTINGS_MAX_RETRIES) {
            match raw.as_u64().and_then(|n| u32::try_from(n).ok()) {
                Some(0) => policy.max_retries = None,
                Some(n) => policy.max_retries = Some(n),
                None => tracing::warn!(value = %raw, "Ignoring malformed max_retries setting"),
            }
        }

        if let Some(raw) = settings.get(SETTINGS_LEASE_SECS) {
            match raw.as_u64() {
                Some(0) => policy.lease = None,
                Some(secs) => policy.lease = Some(Duration::from_secs(secs)),
                None => tracing::warn!(value = %raw, "Ignoring malformed lease_secs setting"),
            }
        }

        policy
    }

    /// Status a task moves to once its failure count reaches `retry_count`.
    pub fn status_after_failure(&self, retry_count: i32) -> TaskStatus {
        match self.max_retries {
            Some(max) if i64::from(retry_count) >= i64::from(max) => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_retries_three_times_without_lease() {
        let policy = QueuePolicy::default();
        assert_eq!(policy.max_retries, Some(3));
        assert_eq!(policy.lease, None);
    }

    #[test]
    fn zero_limits_disable_knobs() {
        let policy = QueuePolicy::from_limits(0, 0);
        assert_eq!(policy.max_retries, None);
        assert_eq!(policy.lease, None);

        let policy = QueuePolicy::from_limits(5, 30);
        assert_eq!(policy.max_retries, Some(5));
        assert_eq!(policy.lease, Some(Duration::from_secs(30)));
    }

    #[test]
    fn project_settings_override_defaults() {
        let settings = json!({ "max_retries": 10, "lease_secs": 600, "other": true });
        let policy = QueuePolicy::default().for_project(Some(&settings));
        assert_eq!(policy.max_retries, Some(10));
        assert_eq!(policy.lease, Some(Duration::from_secs(600)));
    }

    #[test]
    fn project_settings_zero_disables() {
        let base = QueuePolicy::from_limits(3, 60);
        let policy = base.for_project(Some(&json!({ "max_retries": 0, "lease_secs": 0 })));
        assert_eq!(policy.max_retries, None);
        assert_eq!(policy.lease, None);
    }

    #[test]
    fn malformed_settings_are_ignored() {
        let base = QueuePolicy::default();
        let policy = base.for_project(Some(&json!({ "max_retries": "lots", "lease_secs": -5 })));
        assert_eq!(policy, base);
        assert_eq!(base.for_project(None), base);
    }

    #[test]
    fn failure_status_respects_limit() {
        let policy = QueuePolicy::default();
        assert_eq!(policy.status_after_failure(1), TaskStatus::Pending);
        assert_eq!(policy.status_after_failure(2), TaskStatus::Pending);
        assert_eq!(policy.status_after_failure(3), TaskStatus::Failed);

        let unlimited = QueuePolicy::from_limits(0, 0);
        assert_eq!(unlimited.status_after_failure(1_000), TaskStatus::Pending);
    }
}
