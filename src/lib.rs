// SPDX-License-Identifier: GPL-3.0-only

//! Camera pipeline - real-time capture and effect rendering
//!
//! Pulls frames from a live source, applies the selected effect and presents
//! the result at the best fidelity the current load allows, while driving a
//! ribbon of live effect previews and a low-priority head tracker.
//!
//! # Architecture
//!
//! - [`app`]: the pipeline, frame scheduler, draw modes, ribbon and monitors
//! - [`backends`]: capture devices and the background head detector
//! - [`effects`]: the built-in image effects
//! - [`config`]: user configuration handling
//! - [`runtime`]: the tokio event loop that drives a pipeline
//!
//! # Example
//!
//! ```ignore
//! let clock = MonotonicClock::shared();
//! let camera = SyntheticCamera::new(Resolution::new(1280, 720), 30);
//! let mut pipeline = Pipeline::new(config, clock, camera, detector)?;
//! pipeline.start()?;
//! runtime::run(&mut pipeline, shutdown, |_| false).await?;
//! ```

pub mod app;
pub mod backends;
pub mod clock;
pub mod config;
pub mod constants;
pub mod effects;
pub mod errors;
pub mod runtime;

// Re-export commonly used types
pub use app::{DrawMode, InteractionState, Pipeline, PipelineStatus};
pub use backends::camera::{CaptureDevice, Resolution, SyntheticCamera};
pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use config::PipelineConfig;
pub use errors::{AppError, AppResult};
