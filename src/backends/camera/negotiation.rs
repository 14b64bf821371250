// SPDX-License-Identifier: GPL-3.0-only

//! Resolution negotiation
//!
//! The negotiator walks the resolution ladder in strict preference order and
//! owns the single live [`CaptureSession`]. It does not keep timers itself:
//! when a retry is needed it reports so and the caller schedules it in the
//! pipeline's single timer slot.
//!
//! ```text
//!   Idle ──negotiate──► Running ──disconnect──► RetryPending
//!                ▲                                   │
//!                └──────────── deadline ─────────────┘
//!   any ──device locked──► Locked ──unlock──► negotiate
//! ```

use super::{CaptureDevice, Resolution};
use crate::errors::CameraError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The one live capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSession {
    /// Negotiated resolution
    pub resolution: Resolution,
    /// The frame loop should keep re-arming
    pub running: bool,
    /// The stream is believed to be delivering frames
    pub capturing: bool,
    /// When the session was negotiated
    pub started_at: Duration,
    /// Increments for every session; used to discard late results
    pub generation: u64,
}

/// Negotiator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationState {
    /// Never started, or explicitly stopped
    #[default]
    Idle,
    /// A session is live
    Running,
    /// Waiting for the retry timer
    RetryPending,
    /// Device locked; negotiation resumes on unlock
    Locked,
}

/// Result of one negotiation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// A ladder entry was accepted
    Started(Resolution),
    /// Every ladder entry was refused
    NoCamera,
    /// The device is locked; nothing was attempted past the lock
    Locked,
}

/// Walks the resolution ladder and tracks the capture session
#[derive(Debug)]
pub struct Negotiator {
    ladder: Vec<Resolution>,
    state: NegotiationState,
    session: Option<CaptureSession>,
    generation: u64,
}

impl Negotiator {
    pub fn new(ladder: Vec<Resolution>) -> Self {
        Self {
            ladder,
            state: NegotiationState::Idle,
            session: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn ladder(&self) -> &[Resolution] {
        &self.ladder
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut CaptureSession> {
        self.session.as_mut()
    }

    /// Try each ladder entry in order, stopping at the first success
    ///
    /// Any live session is torn down first, so at most one session exists.
    pub fn negotiate<D: CaptureDevice + ?Sized>(
        &mut self,
        device: &mut D,
        now: Duration,
    ) -> NegotiationOutcome {
        if self.session.take().is_some() {
            device.stop();
        }

        if device.is_locked() {
            info!("Device locked, suspending negotiation");
            self.state = NegotiationState::Locked;
            return NegotiationOutcome::Locked;
        }

        for &resolution in &self.ladder {
            match device.start_with_resolution(resolution) {
                Ok(actual) => {
                    self.generation += 1;
                    info!(
                        requested = %resolution,
                        negotiated = %actual,
                        generation = self.generation,
                        "Capture session started"
                    );
                    self.session = Some(CaptureSession {
                        resolution: actual,
                        running: true,
                        capturing: true,
                        started_at: now,
                        generation: self.generation,
                    });
                    self.state = NegotiationState::Running;
                    return NegotiationOutcome::Started(actual);
                }
                Err(CameraError::Locked) => {
                    info!(%resolution, "Device locked during negotiation");
                    self.state = NegotiationState::Locked;
                    return NegotiationOutcome::Locked;
                }
                Err(e) => {
                    debug!(%resolution, error = %e, "Resolution refused, trying next");
                }
            }
        }

        warn!(
            attempts = self.ladder.len(),
            "No resolution accepted, camera unavailable"
        );
        self.state = NegotiationState::RetryPending;
        NegotiationOutcome::NoCamera
    }

    /// Tear down the session after the watchdog saw the stream die
    pub fn disconnect<D: CaptureDevice + ?Sized>(&mut self, device: &mut D) -> Option<CaptureSession> {
        device.stop();
        let session = self.session.take();
        if session.is_some() {
            info!("Capture session torn down after disconnect");
        }
        self.state = NegotiationState::RetryPending;
        session
    }

    /// Stop explicitly; no retry follows
    pub fn stop<D: CaptureDevice + ?Sized>(&mut self, device: &mut D) {
        device.stop();
        if self.session.take().is_some() {
            info!("Capture session stopped");
        }
        self.state = NegotiationState::Idle;
    }

    /// Whether a locked negotiator may resume now
    pub fn can_resume<D: CaptureDevice + ?Sized>(&self, device: &D) -> bool {
        self.state == NegotiationState::Locked && !device.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::SyntheticCamera;
    use crate::constants::RESOLUTION_LADDER;

    fn ladder() -> Vec<Resolution> {
        RESOLUTION_LADDER
            .iter()
            .map(|&(w, h)| Resolution::new(w, h))
            .collect()
    }

    #[test]
    fn test_stops_at_first_supported_resolution() {
        let mut camera = SyntheticCamera::new(Resolution::new(800, 600), 30);
        let mut negotiator = Negotiator::new(ladder());

        let outcome = negotiator.negotiate(&mut camera, Duration::ZERO);

        assert_eq!(outcome, NegotiationOutcome::Started(Resolution::new(800, 600)));
        assert_eq!(
            camera.attempts(),
            &[
                Resolution::new(1920, 1080),
                Resolution::new(1280, 720),
                Resolution::new(800, 600),
            ]
        );
        assert_eq!(negotiator.state(), NegotiationState::Running);
        let session = negotiator.session().unwrap();
        assert!(session.running && session.capturing);
    }

    #[test]
    fn test_exhausted_ladder_reports_no_camera_once() {
        let mut camera = SyntheticCamera::new(Resolution::new(320, 240), 30);
        let mut negotiator = Negotiator::new(ladder());

        let outcome = negotiator.negotiate(&mut camera, Duration::ZERO);

        assert_eq!(outcome, NegotiationOutcome::NoCamera);
        assert_eq!(camera.attempts(), ladder().as_slice());
        assert_eq!(negotiator.state(), NegotiationState::RetryPending);
        assert!(negotiator.session().is_none());
    }

    #[test]
    fn test_locked_device_suspends() {
        let mut camera = SyntheticCamera::new(Resolution::new(1920, 1080), 30);
        let controls = camera.controls();
        controls.set_locked(true);
        let mut negotiator = Negotiator::new(ladder());

        assert_eq!(
            negotiator.negotiate(&mut camera, Duration::ZERO),
            NegotiationOutcome::Locked
        );
        assert!(camera.attempts().is_empty());
        assert!(!negotiator.can_resume(&camera));

        controls.set_locked(false);
        assert!(negotiator.can_resume(&camera));
    }

    #[test]
    fn test_generation_increments_per_session() {
        let mut camera = SyntheticCamera::new(Resolution::new(1920, 1080), 30);
        let mut negotiator = Negotiator::new(ladder());

        negotiator.negotiate(&mut camera, Duration::ZERO);
        let first = negotiator.session().unwrap().generation;
        negotiator.disconnect(&mut camera);
        negotiator.negotiate(&mut camera, Duration::from_secs(1));
        let second = negotiator.session().unwrap().generation;

        assert!(second > first);
    }
}
