// SPDX-License-Identifier: GPL-3.0-only

//! Photo capture sequences
//!
//! A capture request becomes a sequence: an optional countdown, then one or
//! more shots spaced by the multi-shot interval. The sequence only tracks
//! counts and deadlines; the pipeline takes the actual snapshots and arms
//! the foreground activity slot.

use crate::app::activity::ForegroundActivity;
use crate::config::CaptureSettings;
use crate::errors::AppResult;
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// One captured photo
#[derive(Debug, Clone)]
pub struct Photo {
    pub image: RgbaImage,
    pub taken_at: DateTime<Local>,
    /// Effect applied when the photo was taken
    pub effect: String,
    /// Position within its burst (0 for single shots)
    pub sequence: u32,
}

impl Photo {
    pub fn new(image: RgbaImage, effect: impl Into<String>, sequence: u32) -> Self {
        Self {
            image,
            taken_at: Local::now(),
            effect: effect.into(),
            sequence,
        }
    }

    /// `IMG_<timestamp>[_<n>].png`
    pub fn filename(&self) -> String {
        let timestamp = self.taken_at.format("%Y%m%d_%H%M%S");
        if self.sequence == 0 {
            format!("IMG_{}.png", timestamp)
        } else {
            format!("IMG_{}_{}.png", timestamp, self.sequence)
        }
    }

    /// Write the photo into `dir` and return its path
    pub fn save_to_dir(&self, dir: &Path) -> AppResult<PathBuf> {
        let path = dir.join(self.filename());
        self.save(&path)?;
        Ok(path)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        self.image.save(path)?;
        info!(path = %path.display(), effect = %self.effect, "Photo saved");
        Ok(())
    }
}

/// Progress through one capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSequence {
    total: u32,
    taken: u32,
    timer: Option<Duration>,
    interval: Duration,
}

impl CaptureSequence {
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            total: settings.shot_count(),
            taken: 0,
            timer: settings.timer().filter(|t| !t.is_zero()),
            interval: settings.multi_shot_interval(),
        }
    }

    /// Shots still to take
    pub fn remaining(&self) -> u32 {
        self.total - self.taken
    }

    pub fn taken(&self) -> u32 {
        self.taken
    }

    pub fn is_burst(&self) -> bool {
        self.total > 1
    }

    /// Countdown deadline, if the first shot waits for the timer
    pub fn countdown(&self, now: Duration) -> Option<(ForegroundActivity, Duration)> {
        self.timer
            .map(|timer| (ForegroundActivity::Countdown, now + timer))
    }

    /// Sequence index for the next photo
    pub fn next_index(&self) -> u32 {
        if self.is_burst() { self.taken + 1 } else { 0 }
    }

    /// Count a shot; returns the next shot's deadline while shots remain
    pub fn shot_taken(&mut self, now: Duration) -> Option<(ForegroundActivity, Duration)> {
        self.taken = (self.taken + 1).min(self.total);
        debug!(taken = self.taken, total = self.total, "Shot taken");
        if self.remaining() > 0 {
            Some((ForegroundActivity::MultiShot, now + self.interval))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_single_shot_without_timer() {
        let mut sequence = CaptureSequence::new(&CaptureSettings::default());
        assert_eq!(sequence.countdown(ms(0)), None);
        assert_eq!(sequence.next_index(), 0);
        assert_eq!(sequence.shot_taken(ms(0)), None);
        assert_eq!(sequence.remaining(), 0);
    }

    #[test]
    fn test_burst_spacing() {
        let settings = CaptureSettings {
            multi_shot: true,
            ..Default::default()
        };
        let mut sequence = CaptureSequence::new(&settings);
        assert_eq!(
            sequence.shot_taken(ms(100)),
            Some((ForegroundActivity::MultiShot, ms(350)))
        );
        assert_eq!(
            sequence.shot_taken(ms(350)),
            Some((ForegroundActivity::MultiShot, ms(600)))
        );
        assert_eq!(sequence.shot_taken(ms(600)), None);
        assert_eq!(sequence.taken(), 3);
    }

    #[test]
    fn test_timer_arms_countdown() {
        let settings = CaptureSettings {
            timer_ms: Some(3000),
            ..Default::default()
        };
        let sequence = CaptureSequence::new(&settings);
        assert_eq!(
            sequence.countdown(ms(500)),
            Some((ForegroundActivity::Countdown, ms(3500)))
        );
    }

    #[test]
    fn test_filename_includes_burst_index() {
        let single = Photo::new(RgbaImage::new(1, 1), "Normal", 0);
        let burst = Photo::new(RgbaImage::new(1, 1), "Normal", 2);
        assert!(single.filename().starts_with("IMG_"));
        assert!(single.filename().ends_with(".png"));
        assert!(burst.filename().ends_with("_2.png"));
    }

    #[test]
    fn test_save_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let photo = Photo::new(RgbaImage::new(4, 3), "Mono", 0);
        let path = photo.save_to_dir(dir.path()).unwrap();
        let loaded = image::open(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (4, 3));
    }
}
