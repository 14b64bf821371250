// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer
//!
//! Hardware-facing pieces the pipeline consumes through traits:
//! - Camera capture ([`camera::CaptureDevice`])
//! - Head tracking ([`crate::app::detector::HeadDetector`], implemented by
//!   [`tracker::BackgroundDetector`])
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  App Layer                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │   Camera    │    │     Tracker      │    │
//! │  │ (synthetic) │    │ (blocking pool)  │    │
//! │  └─────────────┘    └──────────────────┘    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod camera;
pub mod tracker;
