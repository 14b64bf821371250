// SPDX-License-Identifier: GPL-3.0-only

//! Textures and output surfaces
//!
//! Textures hold source pixels ready for a render pass; the scheduler is the
//! only writer. Surfaces hold rendered output plus the bits of presentation
//! state the pipeline needs: visibility and horizontal on-screen bounds.

use crate::backends::camera::{FrameId, SourceFrame};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::sync::Arc;

/// Which texture a processor reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Full-resolution source frame
    Main,
    /// Source frame refreshed on the FAST cadence
    Fast,
    /// Ribbon-resolution back-buffer
    Ribbon,
    /// Detector-resolution back-buffer (never rendered)
    Detector,
}

impl TextureSlot {
    pub fn name(&self) -> &'static str {
        match self {
            TextureSlot::Main => "main",
            TextureSlot::Fast => "fast",
            TextureSlot::Ribbon => "ribbon",
            TextureSlot::Detector => "detector",
        }
    }
}

/// Source pixels uploaded for one slot
#[derive(Debug, Clone, Default)]
pub struct Texture {
    image: Option<Arc<RgbaImage>>,
    frame: Option<FrameId>,
}

impl Texture {
    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    /// Source frame the pixels came from
    pub fn frame(&self) -> Option<FrameId> {
        self.frame
    }

    pub fn is_populated(&self) -> bool {
        self.image.is_some()
    }
}

/// Every texture the scheduler maintains
#[derive(Debug, Clone, Default)]
pub struct TextureSet {
    pub main: Texture,
    pub fast: Texture,
    pub ribbon: Texture,
    pub detector: Texture,
}

impl TextureSet {
    pub fn get(&self, slot: TextureSlot) -> &Texture {
        match slot {
            TextureSlot::Main => &self.main,
            TextureSlot::Fast => &self.fast,
            TextureSlot::Ribbon => &self.ribbon,
            TextureSlot::Detector => &self.detector,
        }
    }

    fn get_mut(&mut self, slot: TextureSlot) -> &mut Texture {
        match slot {
            TextureSlot::Main => &mut self.main,
            TextureSlot::Fast => &mut self.fast,
            TextureSlot::Ribbon => &mut self.ribbon,
            TextureSlot::Detector => &mut self.detector,
        }
    }

    /// Share the frame's pixels without copying
    pub fn upload(&mut self, slot: TextureSlot, frame: &SourceFrame) {
        let texture = self.get_mut(slot);
        texture.image = Some(Arc::clone(&frame.image));
        texture.frame = Some(frame.id);
    }

    /// Downsample the frame into the slot
    pub fn upload_scaled(&mut self, slot: TextureSlot, frame: &SourceFrame, width: u32, height: u32) {
        let image = if frame.image.dimensions() == (width, height) {
            Arc::clone(&frame.image)
        } else {
            Arc::new(imageops::resize(
                frame.image.as_ref(),
                width.max(1),
                height.max(1),
                FilterType::Triangle,
            ))
        };
        let texture = self.get_mut(slot);
        texture.image = Some(image);
        texture.frame = Some(frame.id);
    }

    /// Drop all pixels (new session)
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Logical viewport of the host view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Horizontal extent of a surface on screen
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HorizontalBounds {
    pub left: f32,
    pub width: f32,
}

impl HorizontalBounds {
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    /// Any part of the bounds lies inside `0..viewport.width`
    pub fn intersects(&self, viewport: &Viewport) -> bool {
        self.width > 0.0 && self.right() > 0.0 && self.left < viewport.width
    }
}

/// Rendered output of one processor
#[derive(Debug, Clone, Default)]
pub struct Surface {
    image: Option<RgbaImage>,
    visible: bool,
    bounds: HorizontalBounds,
    frames_rendered: u64,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn present(&mut self, image: RgbaImage) {
        self.image = Some(image);
        self.frames_rendered += 1;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn bounds(&self) -> HorizontalBounds {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: HorizontalBounds) {
        self.bounds = bounds;
    }

    /// Render passes written into this surface
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}
