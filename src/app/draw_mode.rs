// SPDX-License-Identifier: GPL-3.0-only

//! Main view fidelity
//!
//! The draw mode is a pure function of the current effect's capabilities and
//! the UI's interaction flags; nothing about it survives between frames.
//! [`MainView`] owns the three main processors and keeps exactly one of
//! their surfaces visible.

use crate::app::processor::{EffectBinding, Processor};
use crate::app::surface::TextureSlot;
use crate::effects::EffectCapabilities;
use crate::errors::RenderError;
use serde::Serialize;
use tracing::debug;

/// Render fidelity for the main view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DrawMode {
    /// Cheap path, refreshed on a reduced cadence
    Fast,
    /// Preview path, scaled to the viewport
    Normal,
    /// Full resolution
    Best,
}

impl std::fmt::Display for DrawMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawMode::Fast => write!(f, "FAST"),
            DrawMode::Normal => write!(f, "NORMAL"),
            DrawMode::Best => write!(f, "BEST"),
        }
    }
}

/// UI state that competes with rendering for the frame budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InteractionState {
    pub taking_photo: bool,
    pub toolbar_transition: bool,
    pub window_controls_transition: bool,
    pub ui_animation: bool,
    pub toast_transition: bool,
    /// Pointer-driven ribbon scroll in progress
    pub pointer_scrolling: bool,
    pub ribbon_expanded: bool,
}

impl InteractionState {
    /// Any transition, animation or scroll that suppresses ribbon rendering
    pub fn is_animating(&self) -> bool {
        self.toolbar_transition
            || self.window_controls_transition
            || self.ui_animation
            || self.toast_transition
            || self.pointer_scrolling
    }
}

/// Pick the draw mode; highest priority condition wins
pub fn select_draw_mode(effect: EffectCapabilities, ui: &InteractionState) -> DrawMode {
    if effect.is_multiframe {
        return DrawMode::Best;
    }

    let busy = ui.taking_photo
        || ui.toolbar_transition
        || ui.window_controls_transition
        || effect.is_slow
        || ui.ui_animation
        || ui.toast_transition
        || (ui.pointer_scrolling && ui.ribbon_expanded);

    if busy { DrawMode::Fast } else { DrawMode::Normal }
}

/// The fast, preview and full-resolution processors of the main view
#[derive(Debug)]
pub struct MainView {
    fast: Processor,
    preview: Processor,
    main: Processor,
    shown: Option<DrawMode>,
}

impl MainView {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            fast: Processor::new("main-fast", TextureSlot::Fast, EffectBinding::Current, 1.0)?,
            preview: Processor::new(
                "main-preview",
                TextureSlot::Main,
                EffectBinding::Current,
                1.0,
            )?,
            main: Processor::new("main", TextureSlot::Main, EffectBinding::Current, 1.0)?,
            shown: None,
        })
    }

    pub fn processor(&self, mode: DrawMode) -> &Processor {
        match mode {
            DrawMode::Fast => &self.fast,
            DrawMode::Normal => &self.preview,
            DrawMode::Best => &self.main,
        }
    }

    pub fn processor_mut(&mut self, mode: DrawMode) -> &mut Processor {
        match mode {
            DrawMode::Fast => &mut self.fast,
            DrawMode::Normal => &mut self.preview,
            DrawMode::Best => &mut self.main,
        }
    }

    /// Mode whose surface is currently visible
    pub fn shown(&self) -> Option<DrawMode> {
        self.shown
    }

    /// Make `mode`'s surface the only visible one
    ///
    /// Visibility of all three surfaces is rewritten in one call, so a caller
    /// never observes zero or several visible surfaces after a switch.
    pub fn show(&mut self, mode: DrawMode) {
        if self.shown == Some(mode) {
            return;
        }
        debug!(from = ?self.shown, to = %mode, "Switching main surface");
        for candidate in [DrawMode::Fast, DrawMode::Normal, DrawMode::Best] {
            self.processor_mut(candidate)
                .surface_mut()
                .set_visible(candidate == mode);
        }
        self.shown = Some(mode);
    }

    /// Hide everything (session stopped)
    pub fn hide_all(&mut self) {
        for candidate in [DrawMode::Fast, DrawMode::Normal, DrawMode::Best] {
            self.processor_mut(candidate).surface_mut().set_visible(false);
        }
        self.shown = None;
    }

    pub fn visible_count(&self) -> usize {
        [DrawMode::Fast, DrawMode::Normal, DrawMode::Best]
            .iter()
            .filter(|&&mode| self.processor(mode).surface().is_visible())
            .count()
    }
}

/// Preview scale for the NORMAL path (never above 1.0)
pub fn preview_scale(viewport_height: f32, source_height: u32) -> f32 {
    if source_height == 0 || !(viewport_height > 0.0) {
        return 1.0;
    }
    (viewport_height / source_height as f32).min(1.0)
}
