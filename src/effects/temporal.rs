// SPDX-License-Identifier: GPL-3.0-only

//! Effects with non-trivial scheduling needs
//!
//! - [`Trails`] blends each frame into an accumulator (multi-frame)
//! - [`Pixelate`] averages large blocks (slow)
//! - [`Spotlight`] darkens everything outside the tracked head

use super::{Effect, EffectCapabilities, SharedEffect};
use crate::app::detector::TrackerState;
use image::{Rgba, RgbaImage};
use rand::{Rng, RngCore};
use std::sync::{Arc, Mutex};

/// Motion trails from an exponentially decaying frame accumulator
///
/// The accumulator belongs to this identity; every processor that renders
/// trails holds its own [`Effect::duplicate`].
pub struct Trails {
    decay: f32,
    accumulator: Mutex<Option<RgbaImage>>,
}

impl Trails {
    /// `decay` is the weight kept from the previous output (0..1)
    pub fn new(decay: f32) -> Self {
        Self {
            decay: decay.clamp(0.0, 0.99),
            accumulator: Mutex::new(None),
        }
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }
}

impl Effect for Trails {
    fn name(&self) -> &str {
        "Trails"
    }

    fn capabilities(&self) -> EffectCapabilities {
        EffectCapabilities {
            is_multiframe: true,
            ..Default::default()
        }
    }

    fn process(&self, input: &RgbaImage, _tracker: &TrackerState) -> RgbaImage {
        let mut accumulator = self
            .accumulator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Restart accumulation whenever the frame size changes
        let output = match accumulator.as_ref() {
            Some(previous) if previous.dimensions() == input.dimensions() => {
                let keep = self.decay;
                let mut blended = input.clone();
                for (out, prev) in blended.pixels_mut().zip(previous.pixels()) {
                    for channel in 0..3 {
                        let mixed =
                            prev.0[channel] as f32 * keep + out.0[channel] as f32 * (1.0 - keep);
                        out.0[channel] = mixed.round() as u8;
                    }
                }
                blended
            }
            _ => input.clone(),
        };

        *accumulator = Some(output.clone());
        output
    }

    fn duplicate(&self) -> SharedEffect {
        Arc::new(Trails::new(self.decay))
    }

    fn randomized(&self, rng: &mut dyn RngCore) -> Option<SharedEffect> {
        Some(Arc::new(Trails::new(rng.random_range(0.5..0.95))))
    }
}

/// Block averaging
#[derive(Debug, Clone)]
pub struct Pixelate {
    block: u32,
}

impl Pixelate {
    pub fn new(block: u32) -> Self {
        Self {
            block: block.max(1),
        }
    }

    pub fn block(&self) -> u32 {
        self.block
    }
}

impl Effect for Pixelate {
    fn name(&self) -> &str {
        "Pixelate"
    }

    fn capabilities(&self) -> EffectCapabilities {
        EffectCapabilities {
            is_slow: true,
            ..Default::default()
        }
    }

    fn process(&self, input: &RgbaImage, _tracker: &TrackerState) -> RgbaImage {
        let (width, height) = input.dimensions();
        let mut output = RgbaImage::new(width, height);

        for by in (0..height).step_by(self.block as usize) {
            for bx in (0..width).step_by(self.block as usize) {
                let x_end = (bx + self.block).min(width);
                let y_end = (by + self.block).min(height);

                let mut sum = [0u64; 4];
                let mut count = 0u64;
                for y in by..y_end {
                    for x in bx..x_end {
                        let p = input.get_pixel(x, y);
                        for c in 0..4 {
                            sum[c] += p.0[c] as u64;
                        }
                        count += 1;
                    }
                }

                let avg = Rgba([
                    (sum[0] / count) as u8,
                    (sum[1] / count) as u8,
                    (sum[2] / count) as u8,
                    (sum[3] / count) as u8,
                ]);
                for y in by..y_end {
                    for x in bx..x_end {
                        output.put_pixel(x, y, avg);
                    }
                }
            }
        }

        output
    }

    fn duplicate(&self) -> SharedEffect {
        Arc::new(self.clone())
    }

    fn randomized(&self, rng: &mut dyn RngCore) -> Option<SharedEffect> {
        Some(Arc::new(Pixelate::new(rng.random_range(4..=32))))
    }
}

/// Darken everything outside a circle around the tracked head
#[derive(Debug, Clone)]
pub struct Spotlight {
    /// Radius as a fraction of frame height when no head size is known
    radius: f32,
}

impl Spotlight {
    pub fn new(radius: f32) -> Self {
        Self {
            radius: radius.clamp(0.05, 1.0),
        }
    }
}

impl Effect for Spotlight {
    fn name(&self) -> &str {
        "Spotlight"
    }

    fn capabilities(&self) -> EffectCapabilities {
        EffectCapabilities {
            uses_head_tracker: true,
            ..Default::default()
        }
    }

    fn process(&self, input: &RgbaImage, tracker: &TrackerState) -> RgbaImage {
        let (width, height) = input.dimensions();
        let mut output = input.clone();

        // No head yet: dim the whole frame evenly
        let Some(head) = tracker.current else {
            for pixel in output.pixels_mut() {
                for c in 0..3 {
                    pixel.0[c] /= 2;
                }
            }
            return output;
        };

        let cx = head.x * width as f32;
        let cy = head.y * height as f32;
        let radius = if head.size > 0.0 {
            head.size * height as f32
        } else {
            self.radius * height as f32
        };
        let radius_sq = radius * radius;

        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy > radius_sq {
                for c in 0..3 {
                    pixel.0[c] /= 4;
                }
            }
        }

        output
    }

    fn duplicate(&self) -> SharedEffect {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::detector::HeadPose;

    #[test]
    fn test_trails_blends_with_previous_frame() {
        let trails = Trails::new(0.5);
        let black = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let white = RgbaImage::from_pixel(2, 2, Rgba([200, 200, 200, 255]));
        let tracker = TrackerState::default();

        assert_eq!(trails.process(&black, &tracker), black);
        let blended = trails.process(&white, &tracker);
        assert_eq!(blended.get_pixel(0, 0).0, [100, 100, 100, 255]);
    }

    #[test]
    fn test_trails_restarts_on_size_change() {
        let trails = Trails::new(0.5);
        let tracker = TrackerState::default();
        trails.process(&RgbaImage::new(2, 2), &tracker);
        let bigger = RgbaImage::from_pixel(4, 4, Rgba([80, 80, 80, 255]));
        assert_eq!(trails.process(&bigger, &tracker), bigger);
    }

    #[test]
    fn test_trails_duplicate_has_own_accumulator() {
        let trails = Trails::new(0.5);
        let tracker = TrackerState::default();
        let grey = RgbaImage::from_pixel(2, 2, Rgba([100, 100, 100, 255]));
        trails.process(&RgbaImage::new(2, 2), &tracker);

        let copy = trails.duplicate();
        assert_eq!(copy.process(&grey, &tracker), grey);
        assert_eq!(trails.process(&grey, &tracker).get_pixel(0, 0).0[0], 50);
    }

    #[test]
    fn test_pixelate_uniform_blocks() {
        let mut input = RgbaImage::new(4, 4);
        input.put_pixel(0, 0, Rgba([40, 0, 0, 255]));
        let output = Pixelate::new(2).process(&input, &TrackerState::default());
        assert_eq!(output.get_pixel(0, 0), output.get_pixel(1, 1));
        assert_eq!(output.get_pixel(0, 0).0[0], 10);
        assert_eq!(output.get_pixel(3, 3).0[0], 0);
    }

    #[test]
    fn test_spotlight_keeps_head_region() {
        let input = RgbaImage::from_pixel(10, 10, Rgba([200, 200, 200, 255]));
        let tracker = TrackerState {
            target: None,
            current: Some(HeadPose {
                x: 0.5,
                y: 0.5,
                size: 0.2,
            }),
        };
        let output = Spotlight::new(0.25).process(&input, &tracker);
        assert_eq!(output.get_pixel(5, 5).0[0], 200);
        assert_eq!(output.get_pixel(0, 0).0[0], 50);
    }
}
