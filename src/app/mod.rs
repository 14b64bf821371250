// SPDX-License-Identifier: GPL-3.0-only

//! Capture and render pipeline
//!
//! [`Pipeline`] owns one capture device, the negotiator and watchdog for its
//! session, the frame scheduler and the foreground activity slot. The host
//! drives it from a single task through three entry points:
//!
//! - [`Pipeline::on_refresh`] once per display refresh
//! - [`Pipeline::on_watchdog`] on the watchdog interval
//! - [`Pipeline::poll_timers`] when [`Pipeline::next_deadline`] passes
//!
//! ```text
//!             start / retry
//!   Stopped ───────────────► negotiate ──Started──► Running
//!                               │  │                   │
//!                      NoCamera │  │ Locked            │ watchdog: inactive
//!                               ▼  ▼                   ▼
//!                    retry in 1s  wait for unlock   NoCamera (retry in 1s)
//! ```

pub mod activity;
pub mod capture;
pub mod detector;
pub mod diagnostics;
pub mod draw_mode;
pub mod performance;
pub mod processor;
pub mod ribbon;
pub mod scheduler;
pub mod surface;

pub use activity::{ActivitySlot, ForegroundActivity};
pub use capture::{CaptureSequence, Photo};
pub use detector::{HeadDetector, HeadPose, TrackerState};
pub use diagnostics::{DiagnosticsDump, PipelineStatus, Summary};
pub use draw_mode::{DrawMode, InteractionState};
pub use perf_test::{PerformanceReport, PerformanceTest};
pub use performance::PerformanceMonitor;
pub use scheduler::{FrameScheduler, HostView, TickOutcome};
pub use surface::Viewport;

use crate::backends::camera::{
    CaptureDevice, NegotiationOutcome, NegotiationState, Negotiator, Resolution, Watchdog,
    WatchdogEvent,
};
use crate::clock::SharedClock;
use crate::config::PipelineConfig;
use crate::effects::EffectLibrary;
use crate::errors::{AppError, AppResult, RenderError};
use image::RgbaImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct Pipeline<D: CaptureDevice> {
    config: PipelineConfig,
    clock: SharedClock,
    device: D,
    negotiator: Negotiator,
    watchdog: Watchdog,
    scheduler: FrameScheduler,
    effects: EffectLibrary,
    activity: ActivitySlot,
    capture: Option<CaptureSequence>,
    perf_test: Option<PerformanceTest>,
    perf_report: Option<PerformanceReport>,
    photos: Vec<Photo>,
    ui: InteractionState,
    host: HostView,
    status: PipelineStatus,
    rng: StdRng,
}

impl<D: CaptureDevice> std::fmt::Debug for Pipeline<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("status", &self.status)
            .field("negotiation", &self.negotiator.state())
            .field("activity", &self.activity.current())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl<D: CaptureDevice> Pipeline<D> {
    /// Build a pipeline with the built-in effects
    pub fn new(
        config: PipelineConfig,
        clock: SharedClock,
        device: D,
        detector: Box<dyn HeadDetector>,
    ) -> AppResult<Self> {
        Self::with_effects(config, clock, device, detector, EffectLibrary::builtin())
    }

    pub fn with_effects(
        config: PipelineConfig,
        clock: SharedClock,
        device: D,
        detector: Box<dyn HeadDetector>,
        effects: EffectLibrary,
    ) -> AppResult<Self> {
        config.validate()?;
        let scheduler = FrameScheduler::new(&config, clock.clone(), &effects, detector)?;

        Ok(Self {
            negotiator: Negotiator::new(config.resolution_ladder.clone()),
            watchdog: Watchdog::new(config.watchdog_interval()),
            config,
            clock,
            device,
            scheduler,
            effects,
            activity: ActivitySlot::new(),
            capture: None,
            perf_test: None,
            perf_report: None,
            photos: Vec::new(),
            ui: InteractionState::default(),
            host: HostView::default(),
            status: PipelineStatus::Stopped,
            rng: StdRng::from_os_rng(),
        })
    }

    /// Seed the effect randomizer
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn status(&self) -> &PipelineStatus {
        &self.status
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn effects(&self) -> &EffectLibrary {
        &self.effects
    }

    pub fn activity(&self) -> ForegroundActivity {
        self.activity.current()
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.ui
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    /// Hand over every photo taken so far
    pub fn take_photos(&mut self) -> Vec<Photo> {
        std::mem::take(&mut self.photos)
    }

    /// Report of the last completed performance test
    pub fn performance_report(&self) -> Option<&PerformanceReport> {
        self.perf_report.as_ref()
    }

    /// Negotiate a capture session
    ///
    /// A missing or locked camera is not an error: the pipeline reports it
    /// through its status and retries on its own. A render context that
    /// cannot hold the negotiated resolution is fatal.
    pub fn start(&mut self) -> AppResult<&PipelineStatus> {
        if let PipelineStatus::Error(msg) = &self.status {
            return Err(RenderError::ContextUnavailable(msg.clone()).into());
        }

        let now = self.clock.now();
        self.scheduler.stop();
        self.watchdog.disarm();
        self.activity.finish(ForegroundActivity::RetryPending);

        match self.negotiator.negotiate(&mut self.device, now) {
            NegotiationOutcome::Started(resolution) => {
                self.check_render_context(resolution)?;
                self.scheduler.start(resolution);
                self.watchdog.arm(now);
                self.status = PipelineStatus::Running;
            }
            NegotiationOutcome::NoCamera => {
                if self.status != PipelineStatus::NoCamera {
                    warn!("No camera available");
                }
                self.status = PipelineStatus::NoCamera;
                self.schedule_retry(now);
            }
            NegotiationOutcome::Locked => {
                info!("Camera locked, waiting for unlock");
                self.status = PipelineStatus::Locked;
            }
        }

        Ok(&self.status)
    }

    /// Stop capture; nothing is retried until the next [`Pipeline::start`]
    pub fn stop(&mut self) {
        self.scheduler.stop();
        self.negotiator.stop(&mut self.device);
        self.watchdog.disarm();
        self.cancel_activity();
        if !matches!(self.status, PipelineStatus::Error(_)) {
            self.status = PipelineStatus::Stopped;
        }
    }

    fn check_render_context(&mut self, resolution: Resolution) -> AppResult<()> {
        let max = self.config.max_texture_dimension;
        if resolution.width <= max && resolution.height <= max {
            return Ok(());
        }

        let msg = format!("{} exceeds the maximum texture size {}", resolution, max);
        error!(%resolution, max, "Render context unavailable");
        self.negotiator.stop(&mut self.device);
        self.status = PipelineStatus::Error(msg.clone());
        Err(RenderError::ContextUnavailable(msg).into())
    }

    fn schedule_retry(&mut self, now: Duration) {
        let deadline = now + self.config.retry_backoff();
        debug!(deadline_ms = deadline.as_millis() as u64, "Capture retry scheduled");
        if let Some(cancelled) = self.activity.schedule_retry(deadline) {
            self.abandon(cancelled);
        }
    }

    /// One display-refresh iteration
    pub fn on_refresh(&mut self) -> AppResult<TickOutcome> {
        let source = if self.scheduler.is_running() {
            self.device.latest_frame(self.clock.now())
        } else {
            None
        };

        match self.scheduler.tick(source, &self.ui, &self.host) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, "Rendering failed, stopping session");
                self.stop();
                self.status = PipelineStatus::Error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Liveness poll; tears the session down when the stream has died
    pub fn on_watchdog(&mut self) -> WatchdogEvent {
        let now = self.clock.now();
        let event = self
            .watchdog
            .poll(now, self.negotiator.session_mut(), &self.device);

        if event == WatchdogEvent::Disconnected {
            self.scheduler.stop();
            self.negotiator.disconnect(&mut self.device);
            self.status = PipelineStatus::NoCamera;
            self.schedule_retry(now);
        }
        event
    }

    /// Fire whatever is due: lock resume, retry, countdown, burst or test step
    pub fn poll_timers(&mut self) -> AppResult<()> {
        let now = self.clock.now();

        if self.negotiator.can_resume(&self.device) {
            info!("Camera unlocked, resuming negotiation");
            self.start()?;
        }

        match self.activity.due(now) {
            Some(ForegroundActivity::RetryPending) => {
                self.activity.finish(ForegroundActivity::RetryPending);
                debug!("Retrying capture negotiation");
                self.start()?;
            }
            Some(ForegroundActivity::Countdown) | Some(ForegroundActivity::MultiShot) => {
                if let Err(e) = self.shoot(now) {
                    warn!(error = %e, "Capture sequence aborted");
                    self.cancel_activity();
                }
            }
            Some(ForegroundActivity::PerformanceTest) => self.advance_performance_test(now)?,
            Some(ForegroundActivity::Idle) | None => {}
        }

        Ok(())
    }

    /// Earliest time [`Pipeline::poll_timers`] or [`Pipeline::on_watchdog`]
    /// has work to do
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.activity.deadline(), self.watchdog.next_poll()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn set_interaction(&mut self, ui: InteractionState) {
        self.ui = InteractionState {
            taking_photo: self.capture.is_some(),
            ..ui
        };
    }

    pub fn set_ribbon_expanded(&mut self, expanded: bool) {
        self.ui.ribbon_expanded = expanded;
    }

    pub fn set_host_view(&mut self, host: HostView) {
        self.host = host;
    }

    pub fn scroll_ribbon(&mut self, offset: f32) {
        self.scheduler.ribbon_mut().scroll_to(offset);
    }

    pub fn select_effect(&mut self, index: usize) -> AppResult<()> {
        let effect = self.effects.select(index)?;
        self.scheduler.set_effect(effect);
        Ok(())
    }

    /// Randomize the current effect's parameters
    pub fn randomize_effect(&mut self) {
        let effect = self.effects.randomize_current(&mut self.rng);
        self.scheduler
            .ribbon_mut()
            .rebind(self.effects.current_index(), &effect);
        self.scheduler.set_effect(effect);
    }

    /// Full-resolution render of the latest frame with the current effect
    pub fn snapshot(&mut self) -> AppResult<RgbaImage> {
        Ok(self.scheduler.snapshot()?)
    }

    /// Start a capture sequence per the capture settings
    ///
    /// Without a timer the first shot is taken before returning.
    pub fn take_photo(&mut self) -> AppResult<()> {
        if self.capture.is_some() || !self.activity.is_idle() {
            return Err(AppError::Busy(format!(
                "cannot take a photo while {} is active",
                self.activity.current()
            )));
        }

        let now = self.clock.now();
        let sequence = CaptureSequence::new(&self.config.capture);
        let countdown = sequence.countdown(now);
        self.capture = Some(sequence);
        self.ui.taking_photo = true;

        match countdown {
            Some((activity, deadline)) => {
                info!(seconds = (deadline - now).as_secs_f32(), "Photo timer started");
                self.activity.begin(activity, deadline)
            }
            None => {
                let result = self.shoot(now);
                if result.is_err() {
                    self.end_capture();
                }
                result
            }
        }
    }

    fn end_capture(&mut self) {
        self.capture = None;
        self.ui.taking_photo = false;
    }

    fn shoot(&mut self, now: Duration) -> AppResult<()> {
        let Some(sequence) = self.capture.as_mut() else {
            return Ok(());
        };
        let index = sequence.next_index();

        let image = self.scheduler.snapshot()?;
        let photo = Photo::new(image, self.scheduler.current_effect().name(), index);
        info!(sequence = index, effect = %photo.effect, "Photo captured");
        self.photos.push(photo);

        self.activity.finish(ForegroundActivity::Countdown);
        match self.capture.as_mut().and_then(|s| s.shot_taken(now)) {
            Some((activity, deadline)) => self.activity.begin(activity, deadline)?,
            None => {
                self.activity.finish(ForegroundActivity::MultiShot);
                self.end_capture();
            }
        }
        Ok(())
    }

    /// Cycle every (effect, ribbon) combination, one dwell each
    pub fn start_performance_test(&mut self) -> AppResult<()> {
        if !self.activity.is_idle() {
            return Err(AppError::Busy(format!(
                "cannot start the performance test while {} is active",
                self.activity.current()
            )));
        }

        let now = self.clock.now();
        let test = PerformanceTest::new(
            &self.effects,
            self.config.perf_test_dwell(),
            self.ui.ribbon_expanded,
        );
        info!(combinations = test.len(), "Performance test started");
        self.activity
            .begin(ForegroundActivity::PerformanceTest, now + test.dwell())?;
        self.perf_report = None;
        self.perf_test = Some(test);
        self.apply_combination()
    }

    pub fn performance_test_running(&self) -> bool {
        self.perf_test.is_some()
    }

    fn apply_combination(&mut self) -> AppResult<()> {
        let Some(combination) = self.perf_test.as_ref().and_then(|t| t.current()).cloned() else {
            return Ok(());
        };
        debug!(
            effect = %combination.effect,
            ribbon_expanded = combination.ribbon_expanded,
            "Performance test combination"
        );
        self.select_effect(combination.effect_index)?;
        self.ui.ribbon_expanded = combination.ribbon_expanded;
        self.scheduler.monitor_mut().reset();
        Ok(())
    }

    fn advance_performance_test(&mut self, now: Duration) -> AppResult<()> {
        let fps = self.scheduler.monitor().fps(scheduler::labels::MAIN);
        let average = self.scheduler.monitor().average(scheduler::labels::MAIN);

        let Some(test) = self.perf_test.as_mut() else {
            self.activity.finish(ForegroundActivity::PerformanceTest);
            return Ok(());
        };
        test.record(fps, average);

        if test.is_finished() {
            self.activity.finish(ForegroundActivity::PerformanceTest);
            if let Some(test) = self.perf_test.take() {
                let restore = test.restore();
                let report = test.into_report();
                info!(score = report.score, "Performance test finished");
                self.perf_report = Some(report);
                self.restore_after_test(restore)?;
            }
            return Ok(());
        }

        let dwell = test.dwell();
        self.activity
            .begin(ForegroundActivity::PerformanceTest, now + dwell)?;
        self.apply_combination()
    }

    fn restore_after_test(&mut self, (effect, ribbon_expanded): (usize, bool)) -> AppResult<()> {
        self.ui.ribbon_expanded = ribbon_expanded;
        self.select_effect(effect)
    }

    /// Drop whatever user activity holds the slot
    fn cancel_activity(&mut self) {
        let current = self.activity.current();
        self.activity.clear();
        self.abandon(current);
    }

    /// Clean up after an activity that will not complete
    fn abandon(&mut self, activity: ForegroundActivity) {
        match activity {
            ForegroundActivity::Countdown | ForegroundActivity::MultiShot => {
                if self.capture.is_some() {
                    info!(%activity, "Capture sequence cancelled");
                }
                self.end_capture();
            }
            ForegroundActivity::PerformanceTest => {
                if let Some(test) = self.perf_test.take() {
                    info!("Performance test cancelled");
                    let restore = test.restore();
                    if let Err(e) = self.restore_after_test(restore) {
                        warn!(error = %e, "Failed to restore effect after performance test");
                    }
                }
            }
            ForegroundActivity::RetryPending | ForegroundActivity::Idle => {}
        }
    }

    pub fn summary(&self) -> Summary {
        let resolution = self.negotiator.session().map(|s| s.resolution);

        Summary {
            version: diagnostics::VERSION.to_string(),
            status: self.status.clone(),
            resolution,
            fps: self.scheduler.monitor().fps(scheduler::labels::MAIN),
            detector_fps: self.scheduler.detector().fps(),
            frames: self.scheduler.frame_counter(),
            draw_mode: self.scheduler.draw_mode(),
            effect: self.scheduler.current_effect().name().to_string(),
            activity: self.activity.current(),
        }
    }

    pub fn dump(&self) -> DiagnosticsDump {
        DiagnosticsDump {
            summary: self.summary(),
            monitors: self.scheduler.monitor().dump(),
        }
    }

    /// Negotiation is suspended until the device unlocks
    pub fn is_locked(&self) -> bool {
        self.negotiator.state() == NegotiationState::Locked
    }
}
