// SPDX-License-Identifier: GPL-3.0-only

//! Head detector scheduling
//!
//! The detector is an external, asynchronous component. The scheduler only
//! decides *when* to feed it and *at what resolution*; it never waits for a
//! result. Tracked state is interpolated every frame by the detector's
//! `update` step whether or not a detection was requested.

use crate::app::surface::TextureSet;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::trace;

/// Head position and size, normalized to the frame (0..1)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadPose {
    pub x: f32,
    pub y: f32,
    /// Radius as a fraction of frame height
    pub size: f32,
}

impl HeadPose {
    fn lerp(self, target: HeadPose, t: f32) -> HeadPose {
        HeadPose {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
            size: self.size + (target.size - self.size) * t,
        }
    }
}

/// Tracker output read by effects
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackerState {
    /// Latest detection result
    pub target: Option<HeadPose>,
    /// Smoothed pose effects draw with
    pub current: Option<HeadPose>,
}

impl TrackerState {
    /// Move `current` a fraction `t` of the way to `target`
    pub fn step(&mut self, t: f32) {
        self.current = match (self.current, self.target) {
            (Some(current), Some(target)) => Some(current.lerp(target, t.clamp(0.0, 1.0))),
            (None, target) => target,
            (current, None) => current,
        };
    }
}

/// Boundary of the external head detector
pub trait HeadDetector {
    /// A detection request is outstanding
    fn busy(&self) -> bool;

    /// Start a detection on `image` and return immediately
    fn detect(&mut self, image: RgbaImage);

    /// Absorb finished detections and advance interpolation
    fn update(&mut self);

    /// Completed detections per second (diagnostic)
    fn fps(&self) -> f64;

    fn tracker(&self) -> &TrackerState;

    /// Forget any outstanding request; its result will be ignored
    fn discard_pending(&mut self) {}
}

/// Resolution fed to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectQuality {
    /// Full detector back-buffer (the main effect reads the tracker)
    High,
    /// Half linear scale (only ribbon previews need it)
    Low,
}

/// What the scheduler did this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorDecision {
    /// A detection was issued
    Requested(DetectQuality),
    /// Wanted one, but the previous request is still outstanding
    Busy,
    /// Not due this frame
    NotDue,
}

/// Decides when and how to feed the detector
#[derive(Debug, Clone)]
pub struct DetectorScheduler {
    skip_interval: u64,
    requests: u64,
}

impl DetectorScheduler {
    pub fn new(skip_interval: u64) -> Self {
        Self {
            skip_interval: skip_interval.max(1),
            requests: 0,
        }
    }

    /// Detections issued so far
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Pure trigger rule
    pub fn wanted(
        &self,
        frame_counter: u64,
        uses_head_tracker: bool,
        ribbon_expanded: bool,
    ) -> Option<DetectQuality> {
        if uses_head_tracker {
            Some(DetectQuality::High)
        } else if ribbon_expanded && frame_counter % self.skip_interval == 0 {
            Some(DetectQuality::Low)
        } else {
            None
        }
    }

    /// Issue a detection if due and the detector is idle, then update
    pub fn run(
        &mut self,
        detector: &mut dyn HeadDetector,
        textures: &TextureSet,
        frame_counter: u64,
        uses_head_tracker: bool,
        ribbon_expanded: bool,
    ) -> DetectorDecision {
        let decision = match self.wanted(frame_counter, uses_head_tracker, ribbon_expanded) {
            None => DetectorDecision::NotDue,
            Some(_) if detector.busy() => DetectorDecision::Busy,
            Some(quality) => match downsample_for(textures, quality) {
                Some(image) => {
                    trace!(frame_counter, ?quality, "Requesting detection");
                    detector.detect(image);
                    self.requests += 1;
                    DetectorDecision::Requested(quality)
                }
                None => DetectorDecision::NotDue,
            },
        };

        detector.update();
        decision
    }
}

fn downsample_for(textures: &TextureSet, quality: DetectQuality) -> Option<RgbaImage> {
    let source = textures.detector.image()?;
    match quality {
        DetectQuality::High => Some(source.as_ref().clone()),
        DetectQuality::Low => {
            let width = (source.width() / 2).max(1);
            let height = (source.height() / 2).max(1);
            Some(imageops::resize(source.as_ref(), width, height, FilterType::Triangle))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::app::surface::TextureSlot;
    use crate::backends::camera::{FrameId, SourceFrame};
    use std::sync::Arc;
    use std::time::Duration;

    /// Detector that completes a request after a fixed number of updates
    #[derive(Default)]
    pub(crate) struct ScriptedDetector {
        pub latency: u32,
        pub pending: Option<u32>,
        pub detections: Vec<(u32, u32)>,
        pub updates: u64,
        pub tracker: TrackerState,
    }

    impl HeadDetector for ScriptedDetector {
        fn busy(&self) -> bool {
            self.pending.is_some()
        }

        fn detect(&mut self, image: RgbaImage) {
            self.detections.push(image.dimensions());
            self.pending = Some(self.latency);
        }

        fn update(&mut self) {
            self.updates += 1;
            if let Some(remaining) = self.pending {
                if remaining == 0 {
                    self.pending = None;
                    self.tracker.target = Some(HeadPose {
                        x: 0.5,
                        y: 0.5,
                        size: 0.1,
                    });
                } else {
                    self.pending = Some(remaining - 1);
                }
            }
            self.tracker.step(0.5);
        }

        fn fps(&self) -> f64 {
            0.0
        }

        fn tracker(&self) -> &TrackerState {
            &self.tracker
        }

        fn discard_pending(&mut self) {
            self.pending = None;
        }
    }

    fn textures() -> TextureSet {
        let mut textures = TextureSet::default();
        let frame = SourceFrame {
            id: FrameId(1),
            timestamp: Duration::ZERO,
            image: Arc::new(RgbaImage::new(320, 180)),
        };
        textures.upload_scaled(TextureSlot::Detector, &frame, 320, 180);
        textures
    }

    #[test]
    fn test_trigger_rule() {
        let scheduler = DetectorScheduler::new(6);
        assert_eq!(scheduler.wanted(1, true, false), Some(DetectQuality::High));
        assert_eq!(scheduler.wanted(6, false, true), Some(DetectQuality::Low));
        assert_eq!(scheduler.wanted(7, false, true), None);
        assert_eq!(scheduler.wanted(6, false, false), None);
    }

    #[test]
    fn test_never_overlaps_requests() {
        let mut scheduler = DetectorScheduler::new(6);
        let mut detector = ScriptedDetector {
            latency: 3,
            ..Default::default()
        };
        let textures = textures();

        let decisions: Vec<_> = (1..=6)
            .map(|frame| scheduler.run(&mut detector, &textures, frame, true, false))
            .collect();

        assert_eq!(decisions[0], DetectorDecision::Requested(DetectQuality::High));
        assert_eq!(decisions[1], DetectorDecision::Busy);
        assert_eq!(decisions[2], DetectorDecision::Busy);
        assert_eq!(decisions[3], DetectorDecision::Busy);
        assert_eq!(decisions[4], DetectorDecision::Requested(DetectQuality::High));
        assert_eq!(detector.detections.len(), 2);
    }

    #[test]
    fn test_update_runs_every_frame() {
        let mut scheduler = DetectorScheduler::new(6);
        let mut detector = ScriptedDetector::default();
        let textures = textures();

        for frame in 1..=10 {
            scheduler.run(&mut detector, &textures, frame, false, false);
        }

        assert_eq!(detector.updates, 10);
        assert!(detector.detections.is_empty());
    }

    #[test]
    fn test_low_quality_is_half_scale() {
        let mut scheduler = DetectorScheduler::new(6);
        let mut detector = ScriptedDetector::default();
        let textures = textures();

        scheduler.run(&mut detector, &textures, 6, false, true);
        assert_eq!(detector.detections, vec![(160, 90)]);
    }

    #[test]
    fn test_tracker_step_interpolates() {
        let mut tracker = TrackerState {
            target: Some(HeadPose {
                x: 1.0,
                y: 1.0,
                size: 0.2,
            }),
            current: Some(HeadPose::default()),
        };
        tracker.step(0.5);
        let current = tracker.current.unwrap();
        assert!((current.x - 0.5).abs() < 1e-6);
        assert!((current.size - 0.1).abs() < 1e-6);
    }
}
