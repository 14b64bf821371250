// SPDX-License-Identifier: GPL-3.0-only

//! Render passes
//!
//! A [`Processor`] binds an effect to an input texture slot and an output
//! surface. Bindings are checked when the processor is built; a processor
//! that exists can always run.

use crate::app::detector::TrackerState;
use crate::app::surface::{Surface, TextureSet, TextureSlot};
use crate::effects::SharedEffect;
use crate::errors::RenderError;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::borrow::Cow;
use tracing::trace;

/// Smallest scale a processor accepts
const MIN_SCALE: f32 = 0.01;

/// Which effect a processor applies
#[derive(Clone)]
pub enum EffectBinding {
    /// Whatever effect is current for the main view
    Current,
    /// A fixed effect (ribbon previews)
    Fixed(SharedEffect),
}

impl std::fmt::Debug for EffectBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectBinding::Current => write!(f, "Current"),
            EffectBinding::Fixed(effect) => write!(f, "Fixed({})", effect.name()),
        }
    }
}

/// Everything a render pass reads
#[derive(Clone, Copy)]
pub struct RenderInputs<'a> {
    pub textures: &'a TextureSet,
    pub current_effect: &'a SharedEffect,
    pub tracker: &'a TrackerState,
}

#[derive(Debug)]
pub struct Processor {
    name: String,
    input: TextureSlot,
    binding: EffectBinding,
    scale: f32,
    surface: Surface,
}

impl Processor {
    /// Build a processor, rejecting bindings that could never render
    pub fn new(
        name: impl Into<String>,
        input: TextureSlot,
        binding: EffectBinding,
        scale: f32,
    ) -> Result<Self, RenderError> {
        let name = name.into();
        if input == TextureSlot::Detector {
            return Err(RenderError::InvalidBinding(format!(
                "{}: the detector buffer cannot be rendered",
                name
            )));
        }
        if !scale.is_finite() || scale < MIN_SCALE || scale > 1.0 {
            return Err(RenderError::InvalidBinding(format!(
                "{}: scale {} outside {}..=1",
                name, scale, MIN_SCALE
            )));
        }

        Ok(Self {
            name,
            input,
            binding,
            scale,
            surface: Surface::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> TextureSlot {
        self.input
    }

    pub fn binding(&self) -> &EffectBinding {
        &self.binding
    }

    /// Swap the effect binding (a randomized effect replaced the old identity)
    pub fn set_binding(&mut self, binding: EffectBinding) {
        self.binding = binding;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Clamp to the accepted range; never upscales
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = if scale.is_finite() {
            scale.clamp(MIN_SCALE, 1.0)
        } else {
            1.0
        };
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Apply the bound effect to the bound texture and present the result
    ///
    /// The texture must already hold the current frame.
    pub fn process_frame(&mut self, inputs: RenderInputs<'_>) -> Result<(), RenderError> {
        let texture = inputs.textures.get(self.input);
        let source = texture
            .image()
            .ok_or(RenderError::EmptyTexture(self.input.name()))?;

        let effect = match &self.binding {
            EffectBinding::Current => inputs.current_effect,
            EffectBinding::Fixed(effect) => effect,
        };

        let input: Cow<'_, RgbaImage> = if self.scale < 1.0 {
            let width = ((source.width() as f32 * self.scale).round() as u32).max(1);
            let height = ((source.height() as f32 * self.scale).round() as u32).max(1);
            Cow::Owned(imageops::resize(
                source.as_ref(),
                width,
                height,
                FilterType::Triangle,
            ))
        } else {
            Cow::Borrowed(source.as_ref())
        };

        let output = effect.process(&input, inputs.tracker);
        trace!(
            processor = %self.name,
            effect = effect.name(),
            width = output.width(),
            height = output.height(),
            "Render pass"
        );
        self.surface.present(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{FrameId, SourceFrame};
    use crate::effects::{ColorEffect, ColorFilter};
    use std::sync::Arc;
    use std::time::Duration;

    fn populated() -> TextureSet {
        let mut textures = TextureSet::default();
        let frame = SourceFrame {
            id: FrameId(1),
            timestamp: Duration::ZERO,
            image: Arc::new(RgbaImage::new(100, 50)),
        };
        textures.upload(TextureSlot::Main, &frame);
        textures
    }

    #[test]
    fn test_rejects_detector_binding() {
        let err = Processor::new("bad", TextureSlot::Detector, EffectBinding::Current, 1.0);
        assert!(matches!(err, Err(RenderError::InvalidBinding(_))));
    }

    #[test]
    fn test_rejects_upscaling() {
        assert!(Processor::new("bad", TextureSlot::Main, EffectBinding::Current, 1.5).is_err());
        assert!(Processor::new("bad", TextureSlot::Main, EffectBinding::Current, f32::NAN).is_err());
    }

    #[test]
    fn test_scaled_render() {
        let textures = populated();
        let effect: SharedEffect = Arc::new(ColorEffect::new(ColorFilter::Normal));
        let tracker = TrackerState::default();
        let mut processor =
            Processor::new("preview", TextureSlot::Main, EffectBinding::Current, 0.5).unwrap();

        processor
            .process_frame(RenderInputs {
                textures: &textures,
                current_effect: &effect,
                tracker: &tracker,
            })
            .unwrap();

        assert_eq!(processor.surface().image().unwrap().dimensions(), (50, 25));
        assert_eq!(processor.surface().frames_rendered(), 1);
    }

    #[test]
    fn test_empty_texture_is_error() {
        let textures = TextureSet::default();
        let effect: SharedEffect = Arc::new(ColorEffect::new(ColorFilter::Mono));
        let tracker = TrackerState::default();
        let mut processor =
            Processor::new("main", TextureSlot::Main, EffectBinding::Current, 1.0).unwrap();

        let result = processor.process_frame(RenderInputs {
            textures: &textures,
            current_effect: &effect,
            tracker: &tracker,
        });
        assert_eq!(result, Err(RenderError::EmptyTexture("main")));
    }

    #[test]
    fn test_set_scale_clamps() {
        let mut processor =
            Processor::new("preview", TextureSlot::Main, EffectBinding::Current, 1.0).unwrap();
        processor.set_scale(2.0);
        assert_eq!(processor.scale(), 1.0);
        processor.set_scale(0.0);
        assert_eq!(processor.scale(), MIN_SCALE);
    }
}
