// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame orchestration
//!
//! The scheduler is invoked once per display refresh. It never blocks: each
//! call either returns immediately (stopped, skipped, no new frame) or runs
//! the phases below in order and returns.
//!
//! ```text
//! tick ─► running? ─no──► Stopped (stop re-arming)
//!           │yes
//!           ▼
//!         view active, not resizing? ─no──► Skipped
//!           │yes
//!           ▼
//!         new source frame? ─no──► NoNewFrame
//!           │yes
//!           ▼
//!   downsample ─► detector ─► draw (FAST/NORMAL/BEST) ─► ribbon
//! ```
//!
//! Every phase is measured under its own label; the whole iteration is
//! measured as `"main"`.

use crate::app::detector::{DetectorDecision, DetectorScheduler, HeadDetector};
use crate::app::draw_mode::{DrawMode, InteractionState, MainView, preview_scale, select_draw_mode};
use crate::app::performance::PerformanceMonitor;
use crate::app::processor::RenderInputs;
use crate::app::ribbon::{RibbonMode, RibbonRenderer};
use crate::app::surface::{TextureSet, TextureSlot, Viewport};
use crate::backends::camera::{FrameId, Resolution, SourceFrame};
use crate::clock::SharedClock;
use crate::config::PipelineConfig;
use crate::effects::{EffectLibrary, SharedEffect};
use crate::errors::RenderError;
use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Monitor labels
pub mod labels {
    pub const MAIN: &str = "main";
    pub const DOWNSAMPLE: &str = "downsample";
    pub const DETECTOR: &str = "detector";
    pub const DRAW: &str = "draw";
    pub const RIBBON: &str = "ribbon";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Host view state sampled at the start of each iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostView {
    pub active: bool,
    /// Container is mid-resize
    pub resizing: bool,
    pub viewport: Viewport,
}

impl Default for HostView {
    fn default() -> Self {
        Self {
            active: true,
            resizing: false,
            viewport: Viewport::default(),
        }
    }
}

/// Work done by one rendered iteration
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: FrameId,
    pub frame_counter: u64,
    pub draw_mode: DrawMode,
    pub detector: DetectorDecision,
    pub ribbon_mode: RibbonMode,
    /// Ribbon previews rendered this frame
    pub ribbon_rendered: Vec<usize>,
    /// The fast texture was refreshed from the source
    pub fast_refreshed: bool,
    /// The ribbon and detector back-buffers were refreshed
    pub downsampled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not running; the caller must stop re-arming
    Stopped,
    /// View inactive or resizing
    Skipped,
    /// Source has not produced a new frame
    NoNewFrame,
    Rendered(FrameReport),
}

impl TickOutcome {
    /// Whether the caller should schedule another iteration
    pub fn rearm(&self) -> bool {
        !matches!(self, TickOutcome::Stopped)
    }
}

pub struct FrameScheduler {
    state: LoopState,
    clock: SharedClock,
    monitor: PerformanceMonitor,
    textures: TextureSet,
    main: MainView,
    ribbon: RibbonRenderer,
    detector_scheduler: DetectorScheduler,
    detector: Box<dyn HeadDetector>,
    current_effect: SharedEffect,
    frame_counter: u64,
    last_frame: Option<FrameId>,
    last_mode: Option<DrawMode>,
    resolution: Option<Resolution>,
    fast_refresh_interval: u64,
    downsample_interval: u64,
    ribbon_buffer_width: u32,
    detector_buffer_width: u32,
    ribbon_warmup: Duration,
    warmed_up: bool,
    /// Frame and effect the full-resolution surface currently holds
    best_rendered: Option<(FrameId, SharedEffect)>,
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("state", &self.state)
            .field("frame_counter", &self.frame_counter)
            .field("last_frame", &self.last_frame)
            .field("last_mode", &self.last_mode)
            .field("resolution", &self.resolution)
            .field("effect", &self.current_effect.name())
            .finish()
    }
}

impl FrameScheduler {
    pub fn new(
        config: &PipelineConfig,
        clock: SharedClock,
        effects: &EffectLibrary,
        detector: Box<dyn HeadDetector>,
    ) -> Result<Self, RenderError> {
        let monitor = PerformanceMonitor::new(clock.clone(), config.monitor_horizon());
        let ribbon = RibbonRenderer::new(
            effects,
            config.ribbon_item_width,
            config.ribbon_refresh_interval,
        )?;

        Ok(Self {
            state: LoopState::Stopped,
            clock,
            monitor,
            textures: TextureSet::default(),
            main: MainView::new()?,
            ribbon,
            detector_scheduler: DetectorScheduler::new(config.detector_skip_interval),
            detector,
            current_effect: effects.current(),
            frame_counter: 0,
            last_frame: None,
            last_mode: None,
            resolution: None,
            fast_refresh_interval: config.fast_refresh_interval.max(1),
            downsample_interval: config.downsample_interval.max(1),
            ribbon_buffer_width: config.ribbon_buffer_width,
            detector_buffer_width: config.detector_buffer_width,
            ribbon_warmup: config.ribbon_warmup(),
            warmed_up: false,
            best_rendered: None,
        })
    }

    /// Begin a session at the negotiated resolution
    ///
    /// Counters, textures and monitors restart. The ribbon warm-up runs only
    /// for the first session after startup.
    pub fn start(&mut self, resolution: Resolution) {
        let now = self.clock.now();
        self.state = LoopState::Running;
        self.resolution = Some(resolution);
        self.frame_counter = 0;
        self.last_frame = None;
        self.best_rendered = None;
        self.last_mode = None;
        self.textures.clear();
        self.monitor.reset();
        if !self.warmed_up {
            self.ribbon.start_warmup(now + self.ribbon_warmup);
            self.warmed_up = true;
        }
        info!(%resolution, "Frame loop started");
    }

    /// End the session; the next tick reports [`TickOutcome::Stopped`]
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopped;
        self.detector.discard_pending();
        self.main.hide_all();
        info!(frames = self.frame_counter, "Frame loop stopped");
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Draw mode of the most recent rendered frame
    pub fn draw_mode(&self) -> Option<DrawMode> {
        self.last_mode
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut PerformanceMonitor {
        &mut self.monitor
    }

    pub fn main_view(&self) -> &MainView {
        &self.main
    }

    pub fn ribbon(&self) -> &RibbonRenderer {
        &self.ribbon
    }

    pub fn ribbon_mut(&mut self) -> &mut RibbonRenderer {
        &mut self.ribbon
    }

    pub fn textures(&self) -> &TextureSet {
        &self.textures
    }

    pub fn detector(&self) -> &dyn HeadDetector {
        self.detector.as_ref()
    }

    pub fn detector_requests(&self) -> u64 {
        self.detector_scheduler.requests()
    }

    pub fn current_effect(&self) -> &SharedEffect {
        &self.current_effect
    }

    /// Swap the effect read by every main processor
    pub fn set_effect(&mut self, effect: SharedEffect) {
        debug!(effect = effect.name(), "Current effect swapped");
        self.current_effect = effect;
    }

    /// One display-refresh iteration
    pub fn tick(
        &mut self,
        source: Option<SourceFrame>,
        ui: &InteractionState,
        host: &HostView,
    ) -> Result<TickOutcome, RenderError> {
        if self.state != LoopState::Running {
            return Ok(TickOutcome::Stopped);
        }
        if !host.active || host.resizing {
            trace!(active = host.active, resizing = host.resizing, "Iteration skipped");
            return Ok(TickOutcome::Skipped);
        }
        let frame = match source {
            Some(frame) if Some(frame.id) != self.last_frame => frame,
            _ => return Ok(TickOutcome::NoNewFrame),
        };

        let iteration = self.monitor.start_measuring(labels::MAIN);
        self.frame_counter += 1;
        let frame_counter = self.frame_counter;
        let capabilities = self.current_effect.capabilities();

        // Downsample
        let measurement = self.monitor.start_measuring(labels::DOWNSAMPLE);
        self.textures.upload(TextureSlot::Main, &frame);
        let downsampled = frame_counter % self.downsample_interval == 0
            || !self.textures.ribbon.is_populated()
            || !self.textures.detector.is_populated();
        if downsampled {
            let ribbon_height = frame.resolution().height_for_width(self.ribbon_buffer_width);
            let detector_height = frame.resolution().height_for_width(self.detector_buffer_width);
            self.textures.upload_scaled(
                TextureSlot::Ribbon,
                &frame,
                self.ribbon_buffer_width,
                ribbon_height,
            );
            self.textures.upload_scaled(
                TextureSlot::Detector,
                &frame,
                self.detector_buffer_width,
                detector_height,
            );
        }
        measurement.complete(&mut self.monitor);

        // Detector
        let measurement = self.monitor.start_measuring(labels::DETECTOR);
        let detector = self.detector_scheduler.run(
            self.detector.as_mut(),
            &self.textures,
            frame_counter,
            capabilities.uses_head_tracker,
            ui.ribbon_expanded,
        );
        measurement.complete(&mut self.monitor);

        // Draw
        let measurement = self.monitor.start_measuring(labels::DRAW);
        let draw_mode = select_draw_mode(capabilities, ui);
        // Every FAST frame reads the live source; other modes keep the fast
        // texture warm on the Nth-frame cadence
        let fast_refreshed =
            draw_mode == DrawMode::Fast || frame_counter % self.fast_refresh_interval == 0;
        if fast_refreshed {
            self.textures.upload(TextureSlot::Fast, &frame);
        }
        if draw_mode == DrawMode::Normal {
            let scale = preview_scale(host.viewport.height, frame.image.height());
            self.main.processor_mut(DrawMode::Normal).set_scale(scale);
        }
        let inputs = RenderInputs {
            textures: &self.textures,
            current_effect: &self.current_effect,
            tracker: self.detector.tracker(),
        };
        self.main.processor_mut(draw_mode).process_frame(inputs)?;
        self.main.show(draw_mode);
        if draw_mode == DrawMode::Best {
            self.best_rendered = Some((frame.id, self.current_effect.clone()));
        }
        measurement.complete(&mut self.monitor);

        // Ribbon
        let measurement = self.monitor.start_measuring(labels::RIBBON);
        let ribbon_mode = self.ribbon.mode(ui, frame_counter, self.clock.now());
        let inputs = RenderInputs {
            textures: &self.textures,
            current_effect: &self.current_effect,
            tracker: self.detector.tracker(),
        };
        let ribbon_rendered = self.ribbon.render(ribbon_mode, &host.viewport, inputs)?;
        measurement.complete(&mut self.monitor);

        self.last_frame = Some(frame.id);
        self.last_mode = Some(draw_mode);
        iteration.complete(&mut self.monitor);

        trace!(
            frame = frame.id.0,
            frame_counter,
            %draw_mode,
            ?ribbon_mode,
            "Frame rendered"
        );

        Ok(TickOutcome::Rendered(FrameReport {
            frame: frame.id,
            frame_counter,
            draw_mode,
            detector,
            ribbon_mode,
            ribbon_rendered,
            fast_refreshed,
            downsampled,
        }))
    }

    /// Full-resolution image of the most recent source frame
    ///
    /// Reuses the BEST surface when it already holds this frame with the
    /// current effect, so multi-frame effects are not fed the same frame
    /// twice. The live draw mode is left untouched.
    pub fn snapshot(&mut self) -> Result<RgbaImage, RenderError> {
        let frame = self
            .textures
            .main
            .frame()
            .ok_or(RenderError::EmptyTexture(TextureSlot::Main.name()))?;

        let processor = self.main.processor_mut(DrawMode::Best);
        let current = match &self.best_rendered {
            Some((rendered, effect)) => {
                *rendered == frame && Arc::ptr_eq(effect, &self.current_effect)
            }
            None => false,
        };
        if !current {
            let inputs = RenderInputs {
                textures: &self.textures,
                current_effect: &self.current_effect,
                tracker: self.detector.tracker(),
            };
            processor.process_frame(inputs)?;
            self.best_rendered = Some((frame, self.current_effect.clone()));
        } else {
            trace!(frame = frame.0, "Snapshot reuses the full-resolution surface");
        }

        processor
            .surface()
            .image()
            .cloned()
            .ok_or(RenderError::EmptyTexture(TextureSlot::Main.name()))
    }
}
