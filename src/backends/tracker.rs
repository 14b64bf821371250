// SPDX-License-Identifier: GPL-3.0-only

//! Background head detector
//!
//! Detection runs on tokio's blocking pool so the frame loop never waits on
//! it. Results come back over an unbounded channel and are absorbed in
//! [`HeadDetector::update`], which the scheduler calls every frame.
//!
//! Each request is tagged with a generation. Discarding bumps the generation,
//! so a result that was already in flight when the session stopped is
//! dropped on arrival instead of moving the tracker. The discarded job still
//! occupies the detector until it reports back, so requests never overlap.

use crate::app::detector::{HeadDetector, HeadPose, TrackerState};
use crate::app::performance::{Monitor, Sample};
use crate::clock::SharedClock;
use crate::constants;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

/// Locates a head in a low-resolution frame
pub trait FaceLocator: Send + Sync + 'static {
    fn locate(&self, image: &RgbaImage) -> Option<HeadPose>;
}

/// Centroid of the bright region
///
/// Good enough for the synthetic camera, whose "head" is a bright disc on a
/// dark gradient.
#[derive(Debug, Clone)]
pub struct BrightSpotLocator {
    threshold: u8,
}

impl Default for BrightSpotLocator {
    fn default() -> Self {
        Self::new(200)
    }
}

impl BrightSpotLocator {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl FaceLocator for BrightSpotLocator {
    fn locate(&self, image: &RgbaImage) -> Option<HeadPose> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let threshold = self.threshold as u32;
        let (mut sum_x, mut sum_y, mut count) = (0u64, 0u64, 0u64);
        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b, _] = pixel.0;
            // BT.601 luma in integer form
            let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
            if luma >= threshold {
                sum_x += x as u64;
                sum_y += y as u64;
                count += 1;
            }
        }

        if count == 0 {
            return None;
        }

        let radius = (count as f32 / std::f32::consts::PI).sqrt();
        Some(HeadPose {
            x: (sum_x as f32 / count as f32 + 0.5) / width as f32,
            y: (sum_y as f32 / count as f32 + 0.5) / height as f32,
            size: radius / height as f32,
        })
    }
}

/// A finished detection
#[derive(Debug)]
struct Completed {
    generation: u64,
    pose: Option<HeadPose>,
    elapsed: Duration,
}

/// [`HeadDetector`] backed by the tokio blocking pool
pub struct BackgroundDetector {
    runtime: tokio::runtime::Handle,
    locator: Arc<dyn FaceLocator>,
    clock: SharedClock,
    sender: UnboundedSender<Completed>,
    receiver: UnboundedReceiver<Completed>,
    generation: u64,
    in_flight: bool,
    /// Discarded jobs that have not reported back yet
    orphaned: usize,
    tracker: TrackerState,
    smoothing: f32,
    completions: Monitor,
}

impl std::fmt::Debug for BackgroundDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundDetector")
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight)
            .field("orphaned", &self.orphaned)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl BackgroundDetector {
    /// Spawn detections on `runtime`
    pub fn new(
        runtime: tokio::runtime::Handle,
        locator: Arc<dyn FaceLocator>,
        clock: SharedClock,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = clock.now();
        Self {
            runtime,
            locator,
            clock,
            sender,
            receiver,
            generation: 0,
            in_flight: false,
            orphaned: 0,
            tracker: TrackerState::default(),
            smoothing: constants::tracker::SMOOTHING,
            completions: Monitor::new(constants::MONITOR_HORIZON, now),
        }
    }

    /// Use the runtime of the calling task
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current(locator: Arc<dyn FaceLocator>, clock: SharedClock) -> Option<Self> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        Some(Self::new(runtime, locator, clock))
    }

    /// Fraction of the remaining distance covered by each update
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    fn absorb(&mut self, completed: Completed) {
        if completed.generation != self.generation {
            self.orphaned = self.orphaned.saturating_sub(1);
            trace!(
                generation = completed.generation,
                current = self.generation,
                "Discarding stale detection"
            );
            return;
        }

        self.in_flight = false;
        self.completions.record(Sample {
            timestamp: self.clock.now(),
            duration: completed.elapsed,
        });

        match completed.pose {
            Some(pose) => {
                trace!(x = pose.x, y = pose.y, size = pose.size, "Head located");
                self.tracker.target = Some(pose);
            }
            None => {
                trace!("No head in frame");
                self.tracker.target = None;
                self.tracker.current = None;
            }
        }
    }
}

impl HeadDetector for BackgroundDetector {
    fn busy(&self) -> bool {
        self.in_flight || self.orphaned > 0
    }

    fn detect(&mut self, image: RgbaImage) {
        if self.busy() {
            debug!("Detection requested while busy, ignoring");
            return;
        }

        let generation = self.generation;
        let locator = Arc::clone(&self.locator);
        let sender = self.sender.clone();
        self.in_flight = true;

        self.runtime.spawn_blocking(move || {
            let start = std::time::Instant::now();
            let pose = locator.locate(&image);
            let completed = Completed {
                generation,
                pose,
                elapsed: start.elapsed(),
            };
            if sender.send(completed).is_err() {
                warn!("Detector dropped before detection finished");
            }
        });
    }

    fn update(&mut self) {
        while let Ok(completed) = self.receiver.try_recv() {
            self.absorb(completed);
        }
        self.tracker.step(self.smoothing);
    }

    fn fps(&self) -> f64 {
        self.completions.fps()
    }

    fn tracker(&self) -> &TrackerState {
        &self.tracker
    }

    fn discard_pending(&mut self) {
        if self.in_flight {
            debug!(generation = self.generation, "Discarding in-flight detection");
            self.orphaned += 1;
        }
        self.generation += 1;
        self.in_flight = false;
    }
}
