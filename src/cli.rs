// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! Every command runs the pipeline on the synthetic camera inside a
//! current-thread tokio runtime. The head detector uses the runtime's
//! blocking pool.

use camera_pipeline::app::Pipeline;
use camera_pipeline::backends::camera::{Resolution, SyntheticCamera};
use camera_pipeline::backends::tracker::{BackgroundDetector, BrightSpotLocator};
use camera_pipeline::constants::capture::TIMER_DELAY;
use camera_pipeline::runtime;
use camera_pipeline::{Clock, MonotonicClock, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Largest resolution the synthetic camera accepts
const CAMERA_MAX: Resolution = Resolution::new(1280, 720);

/// Synthetic camera frame rate
const CAMERA_FPS: u32 = 30;

/// Frames to render before a snapshot, so multiframe effects have history
const SNAPSHOT_WARMUP_FRAMES: u64 = 5;

fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

fn build_pipeline(
    config: PipelineConfig,
    runtime: &tokio::runtime::Runtime,
) -> Result<Pipeline<SyntheticCamera>, Box<dyn std::error::Error>> {
    let clock = MonotonicClock::shared();
    let detector = BackgroundDetector::new(
        runtime.handle().clone(),
        Arc::new(BrightSpotLocator::default()),
        clock.clone(),
    );
    let camera = SyntheticCamera::new(CAMERA_MAX, CAMERA_FPS);
    Ok(Pipeline::new(config, clock, camera, Box::new(detector))?)
}

/// Run the live pipeline and print its summary
pub fn run(
    config: PipelineConfig,
    seconds: Option<u64>,
    effect: usize,
    ribbon: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = build_runtime()?;
    let mut pipeline = build_pipeline(config, &rt)?;
    pipeline.select_effect(effect)?;
    pipeline.set_ribbon_expanded(ribbon);

    let shutdown = runtime::install_shutdown_handler()?;
    let status = pipeline.start()?;
    println!("Pipeline {} (press Ctrl+C to stop)", status);

    let deadline = seconds.map(|s| pipeline.clock().now() + Duration::from_secs(s));
    rt.block_on(runtime::run(&mut pipeline, shutdown, |p| {
        deadline.is_some_and(|d| p.clock().now() >= d)
    }))?;

    if json {
        println!("{}", pipeline.dump().to_json()?);
    } else {
        println!("{}", pipeline.summary());
    }
    pipeline.stop();
    Ok(())
}

/// Run the batch performance test and print the table and score
pub fn perf_test(config: PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rt = build_runtime()?;
    let mut pipeline = build_pipeline(config, &rt)?;
    let shutdown = runtime::install_shutdown_handler()?;

    pipeline.start()?;
    pipeline.start_performance_test()?;
    let combinations = pipeline.effects().len() * 2;
    let dwell = pipeline.config().perf_test_dwell();
    println!(
        "Running {} combinations, {:.1}s each (press Ctrl+C to abort)",
        combinations,
        dwell.as_secs_f32()
    );

    rt.block_on(runtime::run(&mut pipeline, shutdown, |p| {
        !p.performance_test_running()
    }))?;

    match pipeline.performance_report() {
        Some(report) => print!("{}", report.table()),
        None => println!("Performance test did not complete"),
    }
    pipeline.stop();
    Ok(())
}

/// Render a few frames, then save a full-resolution snapshot
pub fn snapshot(
    config: PipelineConfig,
    output: PathBuf,
    effect: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = build_runtime()?;
    let mut pipeline = build_pipeline(config, &rt)?;
    pipeline.select_effect(effect)?;
    let shutdown = runtime::install_shutdown_handler()?;

    pipeline.start()?;
    rt.block_on(runtime::run(&mut pipeline, shutdown, |p| {
        p.scheduler().frame_counter() >= SNAPSHOT_WARMUP_FRAMES
    }))?;

    let image = pipeline.snapshot()?;
    image.save(&output)?;
    println!(
        "Snapshot saved: {} ({}x{})",
        output.display(),
        image.width(),
        image.height()
    );
    pipeline.stop();
    Ok(())
}

/// Take a photo or burst through the capture flow and save it
pub fn photo(
    mut config: PipelineConfig,
    output_dir: Option<PathBuf>,
    effect: usize,
    timer: bool,
    burst: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if timer && config.capture.timer_ms.is_none() {
        config.capture.timer_ms = Some(TIMER_DELAY.as_millis() as u64);
    }
    if burst {
        config.capture.multi_shot = true;
    }
    let dir = output_dir
        .or_else(|| dirs::picture_dir().map(|d| d.join("camera-pipeline")))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;

    let rt = build_runtime()?;
    let mut pipeline = build_pipeline(config, &rt)?;
    pipeline.select_effect(effect)?;
    let shutdown = runtime::install_shutdown_handler()?;

    pipeline.start()?;
    rt.block_on(runtime::run(&mut pipeline, shutdown.clone(), |p| {
        p.scheduler().frame_counter() >= SNAPSHOT_WARMUP_FRAMES
    }))?;

    pipeline.take_photo()?;
    if let Some(timer) = pipeline.config().capture.timer() {
        println!("Taking photo in {:.1}s", timer.as_secs_f32());
    }
    rt.block_on(runtime::run(&mut pipeline, shutdown, |p| {
        !p.interaction().taking_photo
    }))?;

    let photos = pipeline.take_photos();
    if photos.is_empty() {
        println!("No photo taken");
    }
    for photo in &photos {
        let path = photo.save_to_dir(&dir)?;
        println!("Photo saved: {}", path.display());
    }
    pipeline.stop();
    Ok(())
}

pub fn print_config(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
