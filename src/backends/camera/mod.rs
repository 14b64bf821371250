// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Pipeline (app)     │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐     ┌──────────┐
//! │ Negotiator          │ ◄── │ Watchdog │  ← liveness polling
//! └──────────┬──────────┘     └──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureDevice trait │  ← negotiation + frame access
//! └──────────┬──────────┘
//!            │
//!            ▼
//!     ┌───────────────┐
//!     │SyntheticCamera│  ← test pattern source
//!     └───────────────┘
//! ```

pub mod negotiation;
pub mod synthetic;
pub mod watchdog;

pub use negotiation::{CaptureSession, NegotiationOutcome, NegotiationState, Negotiator};
pub use synthetic::{SyntheticCamera, SyntheticControls};
pub use watchdog::{Watchdog, WatchdogEvent};

use crate::errors::CameraError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Capture resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether this resolution fits inside `other` on both axes
    pub fn fits_within(&self, other: Resolution) -> bool {
        self.width <= other.width && self.height <= other.height
    }

    /// Height for `width` keeping this resolution's aspect ratio (at least 1)
    pub fn height_for_width(&self, width: u32) -> u32 {
        if self.width == 0 {
            return 1;
        }
        ((self.height as u64 * width as u64) / self.width as u64).max(1) as u32
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Identity of a source frame
///
/// Sources number frames sequentially; the scheduler compares identities to
/// tell a genuinely new frame from one it has already consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

/// A frame delivered by the capture source
///
/// Pixel data is reference counted so textures can share it without a copy.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub id: FrameId,
    /// Presentation time on the pipeline clock
    pub timestamp: Duration,
    pub image: Arc<RgbaImage>,
}

impl SourceFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }
}

/// Live video source
///
/// Implementations negotiate one resolution at a time and then expose the
/// most recent frame. The pipeline never holds more than one started
/// session on a device.
pub trait CaptureDevice: Send {
    /// Try to start streaming at `resolution`
    ///
    /// Returns the resolution actually negotiated.
    fn start_with_resolution(&mut self, resolution: Resolution) -> Result<Resolution, CameraError>;

    /// Stop streaming and release the device
    fn stop(&mut self);

    /// Whether the underlying stream is still delivering
    fn is_active(&self) -> bool;

    /// Whether the device is locked (negotiation cannot succeed while true)
    fn is_locked(&self) -> bool {
        false
    }

    /// Most recent frame, if the stream has produced one
    ///
    /// Returns the same [`FrameId`] until the source produces a new frame.
    fn latest_frame(&mut self, now: Duration) -> Option<SourceFrame>;
}

impl<T: CaptureDevice + ?Sized> CaptureDevice for Box<T> {
    fn start_with_resolution(&mut self, resolution: Resolution) -> Result<Resolution, CameraError> {
        (**self).start_with_resolution(resolution)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn is_locked(&self) -> bool {
        (**self).is_locked()
    }

    fn latest_frame(&mut self, now: Duration) -> Option<SourceFrame> {
        (**self).latest_frame(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_fits_within() {
        let hd = Resolution::new(1280, 720);
        assert!(hd.fits_within(Resolution::new(1920, 1080)));
        assert!(!Resolution::new(1920, 1080).fits_within(hd));
        assert!(Resolution::new(800, 600).fits_within(Resolution::new(800, 600)));
    }

    #[test]
    fn test_height_for_width_keeps_aspect() {
        let res = Resolution::new(1920, 1080);
        assert_eq!(res.height_for_width(160), 90);
        assert_eq!(Resolution::new(640, 480).height_for_width(320), 240);
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::new(800, 600).to_string(), "800x600");
    }
}
