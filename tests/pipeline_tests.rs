// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capture and render pipeline

use camera_pipeline::app::{ForegroundActivity, HeadDetector, TrackerState};
use camera_pipeline::backends::camera::WatchdogEvent;
use camera_pipeline::config::CaptureSettings;
use camera_pipeline::{
    AppError, ManualClock, Pipeline, PipelineConfig, PipelineStatus, Resolution, SyntheticCamera,
};
use image::RgbaImage;
use std::time::Duration;

/// Detector that never finds anything
#[derive(Default)]
struct NullDetector {
    tracker: TrackerState,
}

impl HeadDetector for NullDetector {
    fn busy(&self) -> bool {
        false
    }

    fn detect(&mut self, _image: RgbaImage) {}

    fn update(&mut self) {}

    fn fps(&self) -> f64 {
        0.0
    }

    fn tracker(&self) -> &TrackerState {
        &self.tracker
    }
}

fn small_config() -> PipelineConfig {
    PipelineConfig {
        ribbon_buffer_width: 32,
        detector_buffer_width: 32,
        ..Default::default()
    }
}

fn pipeline_with(
    config: PipelineConfig,
    clock: &ManualClock,
    max: Resolution,
) -> Pipeline<SyntheticCamera> {
    let camera = SyntheticCamera::new(max, 30);
    Pipeline::new(config, clock.shared(), camera, Box::new(NullDetector::default()))
        .unwrap()
        .with_seed(42)
}

/// Advance time in display-refresh steps, servicing every entry point
fn drive(pipeline: &mut Pipeline<SyntheticCamera>, clock: &ManualClock, total: Duration) {
    let step = Duration::from_millis(16);
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        clock.advance(step);
        elapsed += step;
        pipeline.on_refresh().unwrap();
        pipeline.on_watchdog();
        pipeline.poll_timers().unwrap();
    }
}

#[test]
fn test_ladder_tried_in_order_until_success() {
    let clock = ManualClock::new();
    let mut pipeline = pipeline_with(small_config(), &clock, Resolution::new(800, 600));

    assert_eq!(pipeline.start().unwrap(), &PipelineStatus::Running);
    assert_eq!(
        pipeline.device().attempts(),
        &[
            Resolution::new(1920, 1080),
            Resolution::new(1280, 720),
            Resolution::new(800, 600),
        ]
    );
    assert_eq!(
        pipeline.summary().resolution,
        Some(Resolution::new(800, 600))
    );
}

#[test]
fn test_no_camera_retries_after_backoff() {
    let clock = ManualClock::new();
    let mut pipeline = pipeline_with(small_config(), &clock, Resolution::new(320, 240));

    assert_eq!(pipeline.start().unwrap(), &PipelineStatus::NoCamera);
    assert_eq!(pipeline.device().attempts().len(), 4);

    clock.advance(Duration::from_millis(999));
    pipeline.poll_timers().unwrap();
    assert_eq!(pipeline.device().attempts().len(), 4);

    clock.advance(Duration::from_millis(1));
    pipeline.poll_timers().unwrap();
    assert_eq!(pipeline.device().attempts().len(), 8);
    assert_eq!(pipeline.activity(), ForegroundActivity::RetryPending);
}

#[test]
fn test_locked_camera_resumes_on_unlock() {
    let clock = ManualClock::new();
    let mut pipeline = pipeline_with(small_config(), &clock, Resolution::new(640, 480));
    let controls = pipeline.device().controls();
    controls.set_locked(true);

    assert_eq!(pipeline.start().unwrap(), &PipelineStatus::Locked);
    // No periodic retry while locked
    assert_eq!(pipeline.activity(), ForegroundActivity::Idle);
    clock.advance(Duration::from_secs(5));
    pipeline.poll_timers().unwrap();
    assert!(pipeline.is_locked());

    controls.set_locked(false);
    pipeline.poll_timers().unwrap();
    assert_eq!(pipeline.status(), &PipelineStatus::Running);
}

#[test]
fn test_watchdog_flags_disconnect_once() {
    let clock = ManualClock::new();
    let mut pipeline = pipeline_with(small_config(), &clock, Resolution::new(640, 480));
    let controls = pipeline.device().controls();
    pipeline.start().unwrap();
    drive(&mut pipeline, &clock, Duration::from_millis(500));
    assert!(pipeline.scheduler().frame_counter() > 0);

    controls.set_connected(false);
    clock.advance(Duration::from_millis(1000));
    assert_eq!(pipeline.on_watchdog(), WatchdogEvent::Disconnected);
    assert_eq!(pipeline.status(), &PipelineStatus::NoCamera);
    assert!(!pipeline.scheduler().is_running());

    clock.advance(Duration::from_millis(1000));
    assert_ne!(pipeline.on_watchdog(), WatchdogEvent::Disconnected);

    controls.set_connected(true);
    pipeline.poll_timers().unwrap();
    assert_eq!(pipeline.status(), &PipelineStatus::Running);
}

#[test]
fn test_timer_and_burst() {
    let clock = ManualClock::new();
    let config = PipelineConfig {
        capture: CaptureSettings {
            timer_ms: Some(3000),
            multi_shot: true,
            ..Default::default()
        },
        ..small_config()
    };
    let mut pipeline = pipeline_with(config, &clock, Resolution::new(640, 480));
    pipeline.start().unwrap();
    drive(&mut pipeline, &clock, Duration::from_millis(100));

    pipeline.take_photo().unwrap();
    assert_eq!(pipeline.activity(), ForegroundActivity::Countdown);
    assert!(pipeline.interaction().taking_photo);

    drive(&mut pipeline, &clock, Duration::from_millis(2900));
    assert!(pipeline.photos().is_empty());

    drive(&mut pipeline, &clock, Duration::from_millis(1000));
    assert_eq!(pipeline.photos().len(), 3);
    assert_eq!(pipeline.activity(), ForegroundActivity::Idle);
    assert!(!pipeline.interaction().taking_photo);

    let photos = pipeline.take_photos();
    assert_eq!(
        photos.iter().map(|p| p.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(photos.iter().all(|p| p.image.dimensions() == (640, 480)));
}

#[test]
fn test_performance_test_covers_every_combination() {
    let clock = ManualClock::new();
    let config = PipelineConfig {
        perf_test_dwell_ms: 200,
        resolution_ladder: vec![Resolution::new(320, 240)],
        ..small_config()
    };
    let mut pipeline = pipeline_with(config, &clock, Resolution::new(320, 240));
    pipeline.start().unwrap();
    pipeline.start_performance_test().unwrap();
    assert!(matches!(pipeline.take_photo(), Err(AppError::Busy(_))));

    let combinations = pipeline.effects().len() * 2;
    drive(
        &mut pipeline,
        &clock,
        Duration::from_millis(300 * combinations as u64),
    );

    assert!(!pipeline.performance_test_running());
    let report = pipeline.performance_report().unwrap();
    assert_eq!(report.results.len(), combinations);
    assert!(report.score > 0.0);
    assert_eq!(pipeline.effects().current_index(), 0);
    assert!(!pipeline.interaction().ribbon_expanded);
}

#[test]
fn test_disconnect_preempts_performance_test() {
    let clock = ManualClock::new();
    let config = PipelineConfig {
        resolution_ladder: vec![Resolution::new(320, 240)],
        ..small_config()
    };
    let mut pipeline = pipeline_with(config, &clock, Resolution::new(320, 240));
    let controls = pipeline.device().controls();
    pipeline.start().unwrap();
    pipeline.select_effect(2).unwrap();
    pipeline.start_performance_test().unwrap();
    drive(&mut pipeline, &clock, Duration::from_millis(200));

    controls.set_connected(false);
    drive(&mut pipeline, &clock, Duration::from_millis(1200));

    assert_eq!(pipeline.activity(), ForegroundActivity::RetryPending);
    assert!(!pipeline.performance_test_running());
    assert!(pipeline.performance_report().is_none());
    assert_eq!(pipeline.effects().current_index(), 2);
}

#[test]
fn test_summary_reports_live_frame_rate() {
    let clock = ManualClock::new();
    let config = PipelineConfig {
        resolution_ladder: vec![Resolution::new(320, 240)],
        ..small_config()
    };
    let mut pipeline = pipeline_with(config, &clock, Resolution::new(320, 240));
    pipeline.start().unwrap();
    drive(&mut pipeline, &clock, Duration::from_secs(4));

    let summary = pipeline.summary();
    assert!((25.0..=35.0).contains(&summary.fps), "fps {}", summary.fps);
    assert_eq!(summary.resolution, Some(Resolution::new(320, 240)));

    let dump = pipeline.dump();
    let labels: Vec<_> = dump.monitors.iter().map(|m| m.label.as_str()).collect();
    for label in ["detector", "downsample", "draw", "main", "ribbon"] {
        assert!(labels.contains(&label), "missing monitor {}", label);
    }
    assert!(dump.to_json().unwrap().contains("\"monitors\""));
}
