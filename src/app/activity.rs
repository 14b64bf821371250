// SPDX-License-Identifier: GPL-3.0-only

//! Foreground activity slot
//!
//! Retry backoff, the photo countdown, multi-shot bursts and the performance
//! test all need a timer, and at most one of them may run at a time. They
//! share a single slot holding the activity and its next deadline.
//!
//! A retry replaces a pending retry, and preempts any user activity: losing
//! the camera ends a countdown or a performance test. Any other start while
//! the slot is busy is rejected.

use crate::errors::{AppError, AppResult};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ForegroundActivity {
    #[default]
    Idle,
    /// Waiting to renegotiate capture
    RetryPending,
    /// Photo timer counting down to the first shot
    Countdown,
    /// Burst in progress; the deadline is the next shot
    MultiShot,
    /// Batch performance test; the deadline is the next combination
    PerformanceTest,
}

impl std::fmt::Display for ForegroundActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForegroundActivity::Idle => write!(f, "idle"),
            ForegroundActivity::RetryPending => write!(f, "retry pending"),
            ForegroundActivity::Countdown => write!(f, "countdown"),
            ForegroundActivity::MultiShot => write!(f, "multi-shot"),
            ForegroundActivity::PerformanceTest => write!(f, "performance test"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivitySlot {
    activity: ForegroundActivity,
    deadline: Option<Duration>,
}

impl ActivitySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ForegroundActivity {
        self.activity
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn is_idle(&self) -> bool {
        self.activity == ForegroundActivity::Idle
    }

    /// Start a user activity, or re-arm the one already running
    pub fn begin(&mut self, activity: ForegroundActivity, deadline: Duration) -> AppResult<()> {
        if activity == ForegroundActivity::RetryPending {
            self.schedule_retry(deadline);
            return Ok(());
        }
        if activity == ForegroundActivity::Idle {
            self.clear();
            return Ok(());
        }
        if !self.is_idle() && self.activity != activity {
            return Err(AppError::Busy(format!(
                "cannot start {} while {} is active",
                activity, self.activity
            )));
        }

        debug!(%activity, deadline_ms = deadline.as_millis() as u64, "Activity armed");
        self.activity = activity;
        self.deadline = Some(deadline);
        Ok(())
    }

    /// Arm a capture retry, replacing whatever holds the slot
    ///
    /// Returns the user activity that was cancelled, if any.
    pub fn schedule_retry(&mut self, deadline: Duration) -> Option<ForegroundActivity> {
        let cancelled = match self.activity {
            ForegroundActivity::Idle | ForegroundActivity::RetryPending => None,
            other => {
                warn!(activity = %other, "Capture retry cancels running activity");
                Some(other)
            }
        };
        self.activity = ForegroundActivity::RetryPending;
        self.deadline = Some(deadline);
        cancelled
    }

    /// The activity whose deadline has passed, if any
    pub fn due(&self, now: Duration) -> Option<ForegroundActivity> {
        match self.deadline {
            Some(deadline) if now >= deadline && !self.is_idle() => Some(self.activity),
            _ => None,
        }
    }

    /// Free the slot if it holds `activity`
    pub fn finish(&mut self, activity: ForegroundActivity) -> bool {
        if self.activity == activity {
            self.clear();
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.activity = ForegroundActivity::Idle;
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_user_activities_are_exclusive() {
        let mut slot = ActivitySlot::new();
        slot.begin(ForegroundActivity::Countdown, ms(3000)).unwrap();
        let err = slot.begin(ForegroundActivity::PerformanceTest, ms(5000));
        assert!(matches!(err, Err(AppError::Busy(_))));
        assert_eq!(slot.current(), ForegroundActivity::Countdown);
    }

    #[test]
    fn test_same_activity_rearms() {
        let mut slot = ActivitySlot::new();
        slot.begin(ForegroundActivity::MultiShot, ms(250)).unwrap();
        slot.begin(ForegroundActivity::MultiShot, ms(500)).unwrap();
        assert_eq!(slot.deadline(), Some(ms(500)));
    }

    #[test]
    fn test_retry_replaces_retry() {
        let mut slot = ActivitySlot::new();
        assert_eq!(slot.schedule_retry(ms(1000)), None);
        assert_eq!(slot.schedule_retry(ms(2000)), None);
        assert_eq!(slot.deadline(), Some(ms(2000)));
    }

    #[test]
    fn test_retry_preempts_user_activity() {
        let mut slot = ActivitySlot::new();
        slot.begin(ForegroundActivity::PerformanceTest, ms(5000)).unwrap();
        assert_eq!(
            slot.schedule_retry(ms(1000)),
            Some(ForegroundActivity::PerformanceTest)
        );
        assert_eq!(slot.current(), ForegroundActivity::RetryPending);
        assert!(slot.begin(ForegroundActivity::Countdown, ms(3000)).is_err());
    }

    #[test]
    fn test_due_and_finish() {
        let mut slot = ActivitySlot::new();
        slot.begin(ForegroundActivity::Countdown, ms(3000)).unwrap();
        assert_eq!(slot.due(ms(2999)), None);
        assert_eq!(slot.due(ms(3000)), Some(ForegroundActivity::Countdown));
        assert!(!slot.finish(ForegroundActivity::MultiShot));
        assert!(slot.finish(ForegroundActivity::Countdown));
        assert!(slot.is_idle());
        assert_eq!(slot.due(ms(9999)), None);
    }
}
