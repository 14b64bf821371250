// SPDX-License-Identifier: GPL-3.0-only

//! Host event loop
//!
//! Drives a [`Pipeline`] from one tokio task. Every pipeline mutation
//! happens inside this loop, between awaits, so the pipeline itself needs no
//! locking. The suspension points are the four `select!` branches:
//!
//! - display refresh (stops re-arming while the frame loop is stopped)
//! - watchdog interval
//! - the pipeline's next timer deadline (retry, countdown, burst, test step)
//! - shutdown (Ctrl+C or caller-defined completion)

use crate::app::Pipeline;
use crate::backends::camera::CaptureDevice;
use crate::errors::{AppError, AppResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// How often the shutdown flag is checked
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Longest sleep when no timer is armed
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Flag set by the Ctrl+C handler
///
/// The handler can only be installed once per process.
pub fn install_shutdown_handler() -> AppResult<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;
    Ok(flag)
}

/// Run until `shutdown` is set or `done` returns true
///
/// The pipeline must already have been started. Fatal render errors end the
/// loop with an error; everything else is handled inside the pipeline.
pub async fn run<D, F>(
    pipeline: &mut Pipeline<D>,
    shutdown: Arc<AtomicBool>,
    mut done: F,
) -> AppResult<()>
where
    D: CaptureDevice,
    F: FnMut(&Pipeline<D>) -> bool,
{
    let mut refresh = tokio::time::interval(pipeline.config().refresh_interval());
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut watchdog = tokio::time::interval(pipeline.config().watchdog_interval());
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown_poll = tokio::time::interval(SHUTDOWN_POLL);

    let mut refresh_armed = pipeline.scheduler().is_running();
    info!(refresh_armed, "Event loop started");

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested");
            break;
        }
        if done(pipeline) {
            debug!("Completion condition reached");
            break;
        }

        let timer_wait = pipeline
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(pipeline.clock().now()))
            .unwrap_or(IDLE_WAIT);

        tokio::select! {
            _ = refresh.tick(), if refresh_armed => {
                let outcome = pipeline.on_refresh()?;
                if !outcome.rearm() {
                    debug!("Frame loop stopped, refresh disarmed");
                    refresh_armed = false;
                }
            }
            _ = watchdog.tick() => {
                pipeline.on_watchdog();
            }
            _ = tokio::time::sleep(timer_wait) => {
                pipeline.on_watchdog();
                pipeline.poll_timers()?;
            }
            _ = shutdown_poll.tick() => {}
        }

        // A retry or unlock may have restarted the frame loop
        if !refresh_armed && pipeline.scheduler().is_running() {
            debug!("Frame loop running again, refresh re-armed");
            refresh.reset();
            refresh_armed = true;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::detector::tests::ScriptedDetector;
    use crate::backends::camera::{Resolution, SyntheticCamera};
    use crate::clock::MonotonicClock;
    use crate::config::PipelineConfig;

    fn pipeline() -> Pipeline<SyntheticCamera> {
        let config = PipelineConfig {
            resolution_ladder: vec![Resolution::new(64, 36)],
            ribbon_buffer_width: 32,
            detector_buffer_width: 32,
            ..Default::default()
        };
        Pipeline::new(
            config,
            MonotonicClock::shared(),
            SyntheticCamera::new(Resolution::new(64, 36), 30),
            Box::new(ScriptedDetector::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_runs_until_done() {
        let mut pipeline = pipeline();
        pipeline.start().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));

        run(&mut pipeline, shutdown, |p| p.scheduler().frame_counter() >= 3)
            .await
            .unwrap();

        assert!(pipeline.scheduler().frame_counter() >= 3);
    }

    #[tokio::test]
    async fn test_shutdown_flag_ends_loop() {
        let mut pipeline = pipeline();
        pipeline.start().unwrap();
        let shutdown = Arc::new(AtomicBool::new(true));

        run(&mut pipeline, shutdown, |_| false).await.unwrap();
        assert_eq!(pipeline.scheduler().frame_counter(), 0);
    }

    #[tokio::test]
    async fn test_recovers_after_unplug() {
        let mut pipeline = pipeline();
        let controls = pipeline.device().controls();
        pipeline.start().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));

        controls.set_connected(false);
        run(&mut pipeline, shutdown.clone(), |p| {
            *p.status() == crate::app::PipelineStatus::NoCamera
        })
        .await
        .unwrap();

        controls.set_connected(true);
        run(&mut pipeline, shutdown, |p| {
            *p.status() == crate::app::PipelineStatus::Running && p.scheduler().frame_counter() > 0
        })
        .await
        .unwrap();
    }
}
