// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration
//!
//! All tunables live in one serde struct. Missing fields fall back to the
//! defaults in [`crate::constants`], so a config file only needs to name
//! what it changes.

use crate::backends::camera::Resolution;
use crate::constants::{self, buffers, capture, frames, ribbon};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Photo capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Countdown before the first shot (None = shoot immediately)
    pub timer_ms: Option<u64>,
    /// Take a burst instead of a single photo
    pub multi_shot: bool,
    /// Shots per burst
    pub multi_shot_count: u32,
    /// Spacing between burst shots
    pub multi_shot_interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            timer_ms: None,
            multi_shot: false,
            multi_shot_count: capture::MULTI_SHOT_COUNT,
            multi_shot_interval_ms: capture::MULTI_SHOT_INTERVAL.as_millis() as u64,
        }
    }
}

impl CaptureSettings {
    pub fn timer(&self) -> Option<Duration> {
        self.timer_ms.map(Duration::from_millis)
    }

    pub fn multi_shot_interval(&self) -> Duration {
        Duration::from_millis(self.multi_shot_interval_ms)
    }

    /// Number of shots one capture request produces
    pub fn shot_count(&self) -> u32 {
        if self.multi_shot {
            self.multi_shot_count.max(1)
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Trailing window of every performance monitor
    pub monitor_horizon_ms: u64,
    /// Capture resolutions tried in order
    pub resolution_ladder: Vec<Resolution>,
    /// Delay before renegotiating after a failure or disconnect
    pub retry_backoff_ms: u64,
    /// Liveness poll interval
    pub watchdog_interval_ms: u64,
    /// Host display refresh period
    pub refresh_interval_us: u64,
    /// Dwell per combination in the performance test
    pub perf_test_dwell_ms: u64,
    /// FAST mode re-uploads the fast texture every Nth frame
    pub fast_refresh_interval: u64,
    /// Background detection cadence for ribbon-only tracking
    pub detector_skip_interval: u64,
    /// Expanded ribbon refresh cadence (frames)
    pub ribbon_refresh_interval: u64,
    /// Back-buffer downsample cadence (frames)
    pub downsample_interval: u64,
    /// Forced ribbon rendering after startup
    pub ribbon_warmup_ms: u64,
    /// On-screen width of one ribbon thumbnail
    pub ribbon_item_width: f32,
    /// Ribbon back-buffer width
    pub ribbon_buffer_width: u32,
    /// Detector back-buffer width
    pub detector_buffer_width: u32,
    /// Largest texture edge the render context accepts
    pub max_texture_dimension: u32,
    /// Photo capture behaviour
    pub capture: CaptureSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            monitor_horizon_ms: constants::MONITOR_HORIZON.as_millis() as u64,
            resolution_ladder: constants::RESOLUTION_LADDER
                .iter()
                .map(|&(width, height)| Resolution::new(width, height))
                .collect(),
            retry_backoff_ms: constants::RETRY_BACKOFF.as_millis() as u64,
            watchdog_interval_ms: constants::WATCHDOG_INTERVAL.as_millis() as u64,
            refresh_interval_us: constants::REFRESH_INTERVAL.as_micros() as u64,
            perf_test_dwell_ms: constants::PERF_TEST_DWELL.as_millis() as u64,
            fast_refresh_interval: frames::FAST_REFRESH_INTERVAL,
            detector_skip_interval: frames::DETECTOR_SKIP_INTERVAL,
            ribbon_refresh_interval: frames::RIBBON_REFRESH_INTERVAL,
            downsample_interval: frames::DOWNSAMPLE_INTERVAL,
            ribbon_warmup_ms: ribbon::WARMUP.as_millis() as u64,
            ribbon_item_width: ribbon::ITEM_WIDTH,
            ribbon_buffer_width: buffers::RIBBON_WIDTH,
            detector_buffer_width: buffers::DETECTOR_WIDTH,
            max_texture_dimension: buffers::MAX_TEXTURE_DIMENSION,
            capture: CaptureSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Default location: `<config dir>/camera-pipeline/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("camera-pipeline").join("config.json"))
    }

    /// Load from an explicit path, or from the default location
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// parsed or fails validation is an error.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                debug!("No config directory available, using defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Reject values that would stall or divide by zero in the scheduler
    pub fn validate(&self) -> AppResult<()> {
        if self.resolution_ladder.is_empty() {
            return Err(AppError::Config("resolution ladder is empty".to_string()));
        }
        if let Some(res) = self.resolution_ladder.iter().find(|r| r.is_empty()) {
            return Err(AppError::Config(format!(
                "resolution ladder contains empty entry {}",
                res
            )));
        }

        let intervals = [
            ("monitor_horizon_ms", self.monitor_horizon_ms),
            ("watchdog_interval_ms", self.watchdog_interval_ms),
            ("refresh_interval_us", self.refresh_interval_us),
            ("perf_test_dwell_ms", self.perf_test_dwell_ms),
            ("fast_refresh_interval", self.fast_refresh_interval),
            ("detector_skip_interval", self.detector_skip_interval),
            ("ribbon_refresh_interval", self.ribbon_refresh_interval),
            ("downsample_interval", self.downsample_interval),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(AppError::Config(format!("{} must be non-zero", name)));
        }

        if self.ribbon_buffer_width == 0
            || self.detector_buffer_width == 0
            || self.max_texture_dimension == 0
        {
            return Err(AppError::Config(
                "buffer and texture dimensions must be non-zero".to_string(),
            ));
        }
        if !(self.ribbon_item_width > 0.0) {
            return Err(AppError::Config(
                "ribbon_item_width must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn monitor_horizon(&self) -> Duration {
        Duration::from_millis(self.monitor_horizon_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_micros(self.refresh_interval_us)
    }

    pub fn perf_test_dwell(&self) -> Duration {
        Duration::from_millis(self.perf_test_dwell_ms)
    }

    pub fn ribbon_warmup(&self) -> Duration {
        Duration::from_millis(self.ribbon_warmup_ms)
    }
}
