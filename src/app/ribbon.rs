// SPDX-License-Identifier: GPL-3.0-only

//! Effect preview ribbon
//!
//! One processor per effect, laid out left to right. Rendering every preview
//! every frame is too expensive, so each frame renders a bounded subset:
//!
//! - **Warm-up**: every preview, so the ribbon is populated before it is
//!   first shown
//! - **Normal** (expanded, on cadence): visible previews plus one off-screen
//!   preview chosen round robin
//! - **Fast** (collapsed): a single preview chosen round robin
//! - **Idle**: nothing (UI busy, or expanded but off cadence)

use crate::app::draw_mode::InteractionState;
use crate::app::processor::{EffectBinding, Processor, RenderInputs};
use crate::app::surface::{HorizontalBounds, TextureSlot, Viewport};
use crate::effects::{EffectLibrary, SharedEffect};
use crate::errors::RenderError;
use serde::Serialize;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RibbonMode {
    Warmup,
    Normal,
    Fast,
    Idle,
}

#[derive(Debug)]
pub struct RibbonRenderer {
    processors: Vec<Processor>,
    /// Round-robin index into the off-screen set (Normal mode)
    offscreen_cursor: u64,
    /// Round-robin index into the full set (Fast mode)
    fast_cursor: u64,
    refresh_interval: u64,
    warmup_until: Duration,
    item_width: f32,
    scroll_offset: f32,
}

impl RibbonRenderer {
    /// One preview processor per effect in the library
    pub fn new(
        effects: &EffectLibrary,
        item_width: f32,
        refresh_interval: u64,
    ) -> Result<Self, RenderError> {
        let processors = effects
            .iter()
            .enumerate()
            .map(|(index, effect)| {
                Processor::new(
                    format!("ribbon-{}-{}", index, effect.name()),
                    TextureSlot::Ribbon,
                    EffectBinding::Fixed(effect.duplicate()),
                    1.0,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut ribbon = Self {
            processors,
            offscreen_cursor: 0,
            fast_cursor: 0,
            refresh_interval: refresh_interval.max(1),
            warmup_until: Duration::ZERO,
            item_width,
            scroll_offset: 0.0,
        };
        ribbon.layout();
        Ok(ribbon)
    }

    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Point preview `index` at a copy of a new effect identity
    pub fn rebind(&mut self, index: usize, effect: &SharedEffect) {
        if let Some(processor) = self.processors.get_mut(index) {
            processor.set_binding(EffectBinding::Fixed(effect.duplicate()));
        }
    }

    /// Force rendering of every preview until `until`
    pub fn start_warmup(&mut self, until: Duration) {
        self.warmup_until = until;
    }

    /// Scroll the ribbon so that `offset` logical pixels are off the left edge
    pub fn scroll_to(&mut self, offset: f32) {
        self.scroll_offset = offset.max(0.0);
        self.layout();
    }

    fn layout(&mut self) {
        let (width, scroll) = (self.item_width, self.scroll_offset);
        for (index, processor) in self.processors.iter_mut().enumerate() {
            processor.surface_mut().set_bounds(HorizontalBounds {
                left: index as f32 * width - scroll,
                width,
            });
        }
    }

    pub fn mode(&self, ui: &InteractionState, frame_counter: u64, now: Duration) -> RibbonMode {
        if now < self.warmup_until {
            RibbonMode::Warmup
        } else if ui.is_animating() {
            RibbonMode::Idle
        } else if ui.ribbon_expanded {
            if frame_counter % self.refresh_interval == 0 {
                RibbonMode::Normal
            } else {
                RibbonMode::Idle
            }
        } else {
            RibbonMode::Fast
        }
    }

    /// Indices of previews whose surface intersects the viewport
    pub fn visible(&self, viewport: &Viewport) -> Vec<usize> {
        self.processors
            .iter()
            .enumerate()
            .filter(|(_, p)| p.surface().bounds().intersects(viewport))
            .map(|(index, _)| index)
            .collect()
    }

    /// Choose which previews to render, advancing the round-robin cursors
    pub fn plan(&mut self, mode: RibbonMode, viewport: &Viewport) -> Vec<usize> {
        let count = self.processors.len();
        if count == 0 {
            return Vec::new();
        }

        match mode {
            RibbonMode::Idle => Vec::new(),
            RibbonMode::Warmup => (0..count).collect(),
            RibbonMode::Fast => {
                let pick = (self.fast_cursor % count as u64) as usize;
                self.fast_cursor += 1;
                vec![pick]
            }
            RibbonMode::Normal => {
                let visible = self.visible(viewport);
                let hidden: Vec<usize> = (0..count).filter(|i| !visible.contains(i)).collect();
                let mut planned = visible;
                if !hidden.is_empty() {
                    let pick = hidden[(self.offscreen_cursor % hidden.len() as u64) as usize];
                    self.offscreen_cursor += 1;
                    planned.push(pick);
                }
                planned
            }
        }
    }

    /// Render this frame's subset and return the indices rendered
    pub fn render(
        &mut self,
        mode: RibbonMode,
        viewport: &Viewport,
        inputs: RenderInputs<'_>,
    ) -> Result<Vec<usize>, RenderError> {
        let planned = self.plan(mode, viewport);
        for &index in &planned {
            self.processors[index].process_frame(inputs)?;
        }
        if !planned.is_empty() {
            trace!(?mode, rendered = planned.len(), "Ribbon rendered");
        }
        Ok(planned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ribbon() -> RibbonRenderer {
        RibbonRenderer::new(&EffectLibrary::builtin(), 100.0, 3).unwrap()
    }

    fn viewport(width: f32) -> Viewport {
        Viewport {
            width,
            height: 200.0,
        }
    }

    #[test]
    fn test_mode_rules() {
        let mut ribbon = ribbon();
        let expanded = InteractionState {
            ribbon_expanded: true,
            ..Default::default()
        };
        let scrolling = InteractionState {
            pointer_scrolling: true,
            ..expanded
        };
        let now = Duration::from_secs(10);

        assert_eq!(ribbon.mode(&expanded, 3, now), RibbonMode::Normal);
        assert_eq!(ribbon.mode(&expanded, 4, now), RibbonMode::Idle);
        assert_eq!(ribbon.mode(&scrolling, 3, now), RibbonMode::Idle);
        assert_eq!(
            ribbon.mode(&InteractionState::default(), 4, now),
            RibbonMode::Fast
        );

        ribbon.start_warmup(Duration::from_secs(20));
        assert_eq!(ribbon.mode(&scrolling, 4, now), RibbonMode::Warmup);
    }

    #[test]
    fn test_normal_renders_visible_plus_one_hidden() {
        let mut ribbon = ribbon();
        // 8 previews of width 100; a 250-wide viewport shows 0, 1, 2
        let planned = ribbon.plan(RibbonMode::Normal, &viewport(250.0));
        assert_eq!(planned, vec![0, 1, 2, 3]);
        let planned = ribbon.plan(RibbonMode::Normal, &viewport(250.0));
        assert_eq!(planned, vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_offscreen_round_robin_is_fair() {
        let mut ribbon = ribbon();
        let viewport = viewport(250.0);
        let hidden: Vec<usize> = (3..8).collect();
        let frames = 23;
        let mut counts = vec![0usize; ribbon.len()];

        for _ in 0..frames {
            let planned = ribbon.plan(RibbonMode::Normal, &viewport);
            for index in planned.into_iter().filter(|i| hidden.contains(i)) {
                counts[index] += 1;
            }
        }

        let k = hidden.len();
        for index in hidden {
            let n = counts[index];
            assert!(n == frames / k || n == frames.div_ceil(k), "preview {} ran {}", index, n);
        }
    }

    #[test]
    fn test_fast_renders_one_over_full_set() {
        let mut ribbon = ribbon();
        let picks: Vec<usize> = (0..10)
            .flat_map(|_| ribbon.plan(RibbonMode::Fast, &viewport(250.0)))
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 3, 4, 5, 6, 7, 0, 1]);
    }

    #[test]
    fn test_warmup_renders_everything() {
        let mut ribbon = ribbon();
        ribbon.scroll_to(10_000.0);
        assert_eq!(ribbon.plan(RibbonMode::Warmup, &viewport(250.0)).len(), 8);
    }

    #[test]
    fn test_scroll_changes_visibility() {
        let mut ribbon = ribbon();
        ribbon.scroll_to(300.0);
        assert_eq!(ribbon.visible(&viewport(250.0)), vec![3, 4, 5]);
    }

    #[test]
    fn test_previews_hold_their_own_effect_identity() {
        let library = EffectLibrary::builtin();
        let ribbon = RibbonRenderer::new(&library, 100.0, 3).unwrap();
        for (processor, effect) in ribbon.processors().iter().zip(library.iter()) {
            match processor.binding() {
                EffectBinding::Fixed(preview) => {
                    assert!(!std::sync::Arc::ptr_eq(preview, effect));
                    assert_eq!(preview.name(), effect.name());
                }
                other => panic!("unexpected binding {:?}", other),
            }
        }
    }
}
