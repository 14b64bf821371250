// SPDX-License-Identifier: GPL-3.0-only

//! Per-pixel color filters
//!
//! Stateless, cheap, and identical at every scale, so they are safe to run
//! on every processor every frame.

use super::{Effect, EffectCapabilities, SharedEffect};
use crate::app::detector::TrackerState;
use image::{Rgba, RgbaImage};
use rand::{Rng, RngCore};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorFilter {
    /// Passthrough
    Normal,
    /// Luminance only
    Mono,
    /// Warm brownish tint
    Sepia,
    /// Inverted colors
    Negative,
    /// Reduced color levels per channel
    Posterize { levels: u8 },
}

impl ColorFilter {
    pub fn name(&self) -> &'static str {
        match self {
            ColorFilter::Normal => "Normal",
            ColorFilter::Mono => "Mono",
            ColorFilter::Sepia => "Sepia",
            ColorFilter::Negative => "Negative",
            ColorFilter::Posterize { .. } => "Posterize",
        }
    }
}

/// Effect wrapper for a [`ColorFilter`]
#[derive(Debug, Clone)]
pub struct ColorEffect {
    filter: ColorFilter,
}

impl ColorEffect {
    pub fn new(filter: ColorFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> ColorFilter {
        self.filter
    }
}

impl Effect for ColorEffect {
    fn name(&self) -> &str {
        self.filter.name()
    }

    fn capabilities(&self) -> EffectCapabilities {
        EffectCapabilities::default()
    }

    fn process(&self, input: &RgbaImage, _tracker: &TrackerState) -> RgbaImage {
        if self.filter == ColorFilter::Normal {
            return input.clone();
        }
        let mut output = input.clone();
        for pixel in output.pixels_mut() {
            apply_filter_rgba(pixel, self.filter);
        }
        output
    }

    fn duplicate(&self) -> SharedEffect {
        Arc::new(self.clone())
    }

    fn randomized(&self, rng: &mut dyn RngCore) -> Option<SharedEffect> {
        match self.filter {
            ColorFilter::Posterize { .. } => Some(Arc::new(ColorEffect::new(
                ColorFilter::Posterize {
                    levels: rng.random_range(2..=8),
                },
            ))),
            _ => None,
        }
    }
}

#[inline]
fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Apply a filter to one RGBA pixel in place (alpha untouched)
#[inline]
pub fn apply_filter_rgba(pixel: &mut Rgba<u8>, filter: ColorFilter) {
    let [r, g, b, a] = pixel.0;
    let (mut r, mut g, mut b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);

    match filter {
        ColorFilter::Normal => {}

        ColorFilter::Mono => {
            let gray = luminance(r, g, b);
            r = gray;
            g = gray;
            b = gray;
        }

        ColorFilter::Sepia => {
            let lum = luminance(r, g, b);
            r = (lum * 1.2 + 0.1).clamp(0.0, 1.0);
            g = (lum * 0.9 + 0.05).clamp(0.0, 1.0);
            b = (lum * 0.7).clamp(0.0, 1.0);
        }

        ColorFilter::Negative => {
            r = 1.0 - r;
            g = 1.0 - g;
            b = 1.0 - b;
        }

        ColorFilter::Posterize { levels } => {
            let steps = (levels.max(2) - 1) as f32;
            r = (r * steps).round() / steps;
            g = (g * steps).round() / steps;
            b = (b * steps).round() / steps;
        }
    }

    *pixel = Rgba([
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
        a,
    ]);
}
