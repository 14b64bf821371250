// SPDX-License-Identifier: GPL-3.0-only

//! Capture liveness watchdog
//!
//! Native "stream ended" notifications are unreliable, so the session is
//! polled on a fixed interval instead.

use super::{CaptureDevice, CaptureSession};
use std::time::Duration;
use tracing::{trace, warn};

/// Result of one watchdog poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// Not due yet, or no session to watch
    Idle,
    /// Session polled and still active
    Alive,
    /// Stream went inactive; the session has been marked stopped
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    interval: Duration,
    next_poll: Option<Duration>,
}

impl Watchdog {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_poll: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling `interval` from `now`
    pub fn arm(&mut self, now: Duration) {
        self.next_poll = Some(now + self.interval);
    }

    pub fn disarm(&mut self) {
        self.next_poll = None;
    }

    pub fn next_poll(&self) -> Option<Duration> {
        self.next_poll
    }

    /// Poll the session if due
    ///
    /// `capturing` flips from true to false at most once per session; a
    /// session that is already not capturing never reports again.
    pub fn poll<D: CaptureDevice + ?Sized>(
        &mut self,
        now: Duration,
        session: Option<&mut CaptureSession>,
        device: &D,
    ) -> WatchdogEvent {
        let Some(due) = self.next_poll else {
            return WatchdogEvent::Idle;
        };
        if now < due {
            return WatchdogEvent::Idle;
        }
        self.next_poll = Some(now + self.interval);

        let Some(session) = session else {
            return WatchdogEvent::Idle;
        };
        if !session.capturing {
            return WatchdogEvent::Idle;
        }

        if device.is_active() {
            trace!(generation = session.generation, "Watchdog: stream alive");
            return WatchdogEvent::Alive;
        }

        warn!(generation = session.generation, "Watchdog: stream inactive");
        session.capturing = false;
        session.running = false;
        self.next_poll = None;
        WatchdogEvent::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{Resolution, SyntheticCamera};

    fn session() -> CaptureSession {
        CaptureSession {
            resolution: Resolution::new(64, 48),
            running: true,
            capturing: true,
            started_at: Duration::ZERO,
            generation: 1,
        }
    }

    #[test]
    fn test_not_due_before_interval() {
        let camera = SyntheticCamera::new(Resolution::new(64, 48), 30);
        let mut watchdog = Watchdog::new(Duration::from_millis(1000));
        watchdog.arm(Duration::ZERO);
        let mut session = session();

        assert_eq!(
            watchdog.poll(Duration::from_millis(999), Some(&mut session), &camera),
            WatchdogEvent::Idle
        );
    }

    #[test]
    fn test_disconnect_reported_exactly_once() {
        let mut camera = SyntheticCamera::new(Resolution::new(64, 48), 30);
        camera.start_with_resolution(Resolution::new(64, 48)).unwrap();
        let controls = camera.controls();
        let mut watchdog = Watchdog::new(Duration::from_millis(1000));
        watchdog.arm(Duration::ZERO);
        let mut session = session();

        assert_eq!(
            watchdog.poll(Duration::from_millis(1000), Some(&mut session), &camera),
            WatchdogEvent::Alive
        );
        assert!(session.capturing);

        controls.set_connected(false);
        assert_eq!(
            watchdog.poll(Duration::from_millis(2000), Some(&mut session), &camera),
            WatchdogEvent::Disconnected
        );
        assert!(!session.capturing);
        assert!(!session.running);

        watchdog.arm(Duration::from_millis(2000));
        assert_eq!(
            watchdog.poll(Duration::from_millis(3000), Some(&mut session), &camera),
            WatchdogEvent::Idle
        );
    }
}
