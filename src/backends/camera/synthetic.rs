// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic test-pattern camera
//!
//! Produces a moving gradient with a bright disc that drifts across the
//! frame, at a fixed frame rate. The disc gives the head tracker something
//! to follow. [`SyntheticControls`] lets a caller unplug or lock the device
//! while it is in use.

use super::{CaptureDevice, FrameId, Resolution, SourceFrame};
use crate::errors::CameraError;
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Shared switches for a [`SyntheticCamera`]
#[derive(Debug, Clone)]
pub struct SyntheticControls {
    connected: Arc<AtomicBool>,
    locked: Arc<AtomicBool>,
}

impl Default for SyntheticControls {
    fn default() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(true)),
            locked: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SyntheticControls {
    /// Plug or unplug the device
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

/// Camera that renders a test pattern
pub struct SyntheticCamera {
    max_resolution: Resolution,
    frame_interval: Duration,
    controls: SyntheticControls,
    active: Option<Resolution>,
    started_at: Option<Duration>,
    cached: Option<SourceFrame>,
    /// Resolutions requested so far, in order
    attempts: Vec<Resolution>,
}

impl SyntheticCamera {
    /// Camera supporting everything up to `max_resolution` at `fps`
    pub fn new(max_resolution: Resolution, fps: u32) -> Self {
        Self {
            max_resolution,
            frame_interval: (Duration::from_secs(1) / fps.max(1)).max(Duration::from_millis(1)),
            controls: SyntheticControls::default(),
            active: None,
            started_at: None,
            cached: None,
            attempts: Vec::new(),
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn controls(&self) -> SyntheticControls {
        self.controls.clone()
    }

    /// Every resolution passed to `start_with_resolution`, oldest first
    pub fn attempts(&self) -> &[Resolution] {
        &self.attempts
    }

    fn frame_index(&self, now: Duration) -> Option<u64> {
        let started = self.started_at?;
        let elapsed = now.checked_sub(started)?;
        Some((elapsed.as_nanos() / self.frame_interval.as_nanos()) as u64)
    }
}

impl CaptureDevice for SyntheticCamera {
    fn start_with_resolution(&mut self, resolution: Resolution) -> Result<Resolution, CameraError> {
        self.attempts.push(resolution);

        if self.controls.is_locked() {
            return Err(CameraError::Locked);
        }
        if !self.controls.is_connected() {
            return Err(CameraError::ResolutionNotSupported(resolution));
        }
        if !resolution.fits_within(self.max_resolution) {
            debug!(%resolution, max = %self.max_resolution, "Synthetic camera refused resolution");
            return Err(CameraError::ResolutionNotSupported(resolution));
        }

        info!(%resolution, "Synthetic camera started");
        self.active = Some(resolution);
        self.started_at = None;
        self.cached = None;
        Ok(resolution)
    }

    fn stop(&mut self) {
        if self.active.take().is_some() {
            debug!("Synthetic camera stopped");
        }
        self.started_at = None;
        self.cached = None;
    }

    fn is_active(&self) -> bool {
        self.active.is_some() && self.controls.is_connected()
    }

    fn is_locked(&self) -> bool {
        self.controls.is_locked()
    }

    fn latest_frame(&mut self, now: Duration) -> Option<SourceFrame> {
        let resolution = self.active?;
        if !self.controls.is_connected() {
            return self.cached.clone();
        }
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }

        let index = self.frame_index(now)?;
        if let Some(cached) = &self.cached {
            if cached.id.0 == index {
                return Some(cached.clone());
            }
        }

        let frame = SourceFrame {
            id: FrameId(index),
            timestamp: now,
            image: Arc::new(render_pattern(resolution, index)),
        };
        self.cached = Some(frame.clone());
        Some(frame)
    }
}

/// Centre of the drifting disc for frame `index`, normalized to 0..1
pub fn pattern_target(index: u64) -> (f32, f32) {
    let t = index as f32 * 0.05;
    (0.5 + 0.3 * t.sin(), 0.5 + 0.2 * (t * 0.7).cos())
}

fn render_pattern(resolution: Resolution, index: u64) -> RgbaImage {
    let (cx, cy) = pattern_target(index);
    let width = resolution.width as f32;
    let height = resolution.height as f32;
    let radius = height * 0.12;
    let shift = (index % 256) as u8;

    RgbaImage::from_fn(resolution.width, resolution.height, |x, y| {
        let dx = x as f32 - cx * width;
        let dy = y as f32 - cy * height;
        if dx * dx + dy * dy <= radius * radius {
            return Rgba([250, 220, 200, 255]);
        }
        let r = ((x * 255 / resolution.width.max(1)) as u8).wrapping_add(shift);
        let g = (y * 255 / resolution.height.max(1)) as u8;
        Rgba([r / 2, g / 2, 96, 255])
    })
}
