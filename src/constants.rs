// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants
//!
//! These are the defaults behind [`crate::config::PipelineConfig`]. Every
//! value here can be overridden from the configuration file.

use std::time::Duration;

/// Trailing window kept by every performance monitor
pub const MONITOR_HORIZON: Duration = Duration::from_millis(3000);

/// Capture resolutions in strict descending preference order
pub const RESOLUTION_LADDER: [(u32, u32); 4] = [(1920, 1080), (1280, 720), (800, 600), (640, 480)];

/// Delay before renegotiating after the ladder is exhausted or the stream drops
pub const RETRY_BACKOFF: Duration = Duration::from_millis(1000);

/// Interval between liveness polls of the capture stream
pub const WATCHDOG_INTERVAL: Duration = Duration::from_millis(1000);

/// Display refresh period the host loop is armed with (~60 Hz)
pub const REFRESH_INTERVAL: Duration = Duration::from_micros(16_667);

/// Time spent on each (effect, ribbon) combination during a performance test
pub const PERF_TEST_DWELL: Duration = Duration::from_millis(5000);

/// Timing constants for the frame scheduler
pub mod frames {
    /// In FAST mode the fast texture is re-uploaded every Nth frame
    pub const FAST_REFRESH_INTERVAL: u64 = 10;

    /// Background detection cadence when only ribbon previews need tracking
    pub const DETECTOR_SKIP_INTERVAL: u64 = 6;

    /// Expanded ribbon renders its visible previews every Nth frame
    pub const RIBBON_REFRESH_INTERVAL: u64 = 3;

    /// Back-buffers (ribbon and detector) are downsampled every Nth frame
    pub const DOWNSAMPLE_INTERVAL: u64 = 1;
}

/// Sizes of the downsampled back-buffers
pub mod buffers {
    /// Width of the ribbon back-buffer (height follows the source aspect)
    pub const RIBBON_WIDTH: u32 = 160;

    /// Width of the detector back-buffer (height follows the source aspect)
    pub const DETECTOR_WIDTH: u32 = 320;

    /// Largest texture edge the render context accepts
    pub const MAX_TEXTURE_DIMENSION: u32 = 4096;
}

/// Ribbon layout
pub mod ribbon {
    use std::time::Duration;

    /// Ribbon previews are forced for this long after startup
    pub const WARMUP: Duration = Duration::from_millis(2000);

    /// On-screen width of one preview thumbnail (logical pixels)
    pub const ITEM_WIDTH: f32 = 120.0;
}

/// Photo capture
pub mod capture {
    use std::time::Duration;

    /// Countdown before the first shot when the timer is enabled
    pub const TIMER_DELAY: Duration = Duration::from_secs(3);

    /// Number of shots taken in multi-shot mode
    pub const MULTI_SHOT_COUNT: u32 = 3;

    /// Spacing between multi-shot captures
    pub const MULTI_SHOT_INTERVAL: Duration = Duration::from_millis(250);
}

/// Head tracker
pub mod tracker {
    /// Fraction of the remaining distance the tracker moves per frame
    pub const SMOOTHING: f32 = 0.3;
}
