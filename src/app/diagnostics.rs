// SPDX-License-Identifier: GPL-3.0-only

//! Diagnostics surface
//!
//! A one-line status summary and a full monitor dump, both serializable to
//! JSON for the command line.

use crate::app::activity::ForegroundActivity;
use crate::app::draw_mode::DrawMode;
use crate::app::performance::MonitorStats;
use crate::backends::camera::Resolution;
use crate::errors::AppResult;
use serde::Serialize;

/// Crate version from `git describe`, set by the build script
pub const VERSION: &str = env!("GIT_VERSION");

/// Coarse pipeline status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum PipelineStatus {
    Stopped,
    Running,
    /// Ladder exhausted or stream lost; retrying
    NoCamera,
    /// Device locked by another client
    Locked,
    /// Fatal render error; the session will not be retried
    Error(String),
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Stopped => write!(f, "stopped"),
            PipelineStatus::Running => write!(f, "running"),
            PipelineStatus::NoCamera => write!(f, "no camera"),
            PipelineStatus::Locked => write!(f, "camera locked"),
            PipelineStatus::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub version: String,
    pub status: PipelineStatus,
    pub resolution: Option<Resolution>,
    pub fps: f64,
    pub detector_fps: f64,
    pub frames: u64,
    pub draw_mode: Option<DrawMode>,
    pub effect: String,
    pub activity: ForegroundActivity,
}

impl Summary {
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "camera-pipeline {} | {}", self.version, self.status)?;
        if let Some(resolution) = self.resolution {
            write!(f, " | {}", resolution)?;
        }
        write!(f, " | {:.1} fps | detector {:.1} fps", self.fps, self.detector_fps)?;
        if let Some(mode) = self.draw_mode {
            write!(f, " | {}", mode)?;
        }
        write!(f, " | {}", self.effect)
    }
}

/// Summary plus every monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsDump {
    pub summary: Summary,
    pub monitors: Vec<MonitorStats>,
}

impl DiagnosticsDump {
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
