// SPDX-License-Identifier: GPL-3.0-only

//! Windowed performance monitors
//!
//! Each measured task records a [`Sample`] when it completes. Monitors keep
//! only the trailing horizon of samples and report rolling FPS and average
//! duration from what is left.

use crate::clock::SharedClock;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// One completed measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// When the task completed
    pub timestamp: Duration,
    /// How long it ran
    pub duration: Duration,
}

/// Samples for a single label, pruned to a trailing window
#[derive(Debug, Clone)]
pub struct Monitor {
    horizon: Duration,
    samples: VecDeque<Sample>,
    /// Notional start of the window
    ///
    /// Starts at the reset time. Once it falls behind the horizon it is moved
    /// to the oldest retained sample, never to `now - horizon`, so sparse
    /// sampling does not skew the rate.
    window_start: Duration,
}

impl Monitor {
    pub fn new(horizon: Duration, start: Duration) -> Self {
        Self {
            horizon,
            samples: VecDeque::new(),
            window_start: start,
        }
    }

    /// Append a sample and prune everything older than the horizon
    pub fn record(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        self.prune(sample.timestamp);
    }

    fn prune(&mut self, now: Duration) {
        let Some(cutoff) = now.checked_sub(self.horizon) else {
            return;
        };
        while self
            .samples
            .front()
            .is_some_and(|sample| sample.timestamp < cutoff)
        {
            self.samples.pop_front();
        }
        if self.window_start < cutoff {
            if let Some(oldest) = self.samples.front() {
                self.window_start = oldest.timestamp;
            }
        }
    }

    /// Samples per second over the window
    pub fn fps(&self) -> f64 {
        let Some(latest) = self.samples.back() else {
            return 0.0;
        };
        let elapsed = latest.timestamp.saturating_sub(self.window_start);
        if elapsed.is_zero() {
            return 0.0;
        }
        self.samples.len() as f64 / elapsed.as_secs_f64()
    }

    /// Mean duration of the retained samples
    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().map(|s| s.duration).sum();
        total / self.samples.len() as u32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window_start(&self) -> Duration {
        self.window_start
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

/// Pending measurement returned by [`PerformanceMonitor::start_measuring`]
///
/// Completing it records the elapsed time under its label.
#[derive(Debug, Clone)]
#[must_use = "a measurement records nothing until completed"]
pub struct Measurement {
    label: String,
    start: Duration,
}

impl Measurement {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Record `now - start` under the label and return the duration
    pub fn complete(self, monitor: &mut PerformanceMonitor) -> Duration {
        let now = monitor.clock.now();
        let duration = now.saturating_sub(self.start);
        monitor.record(&self.label, now, duration);
        duration
    }
}

/// Statistics for one monitor, as shown in the debug dump
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStats {
    pub label: String,
    pub fps: f64,
    pub average_ms: f64,
    pub samples: usize,
}

/// Named monitors, created on first use
pub struct PerformanceMonitor {
    clock: SharedClock,
    horizon: Duration,
    started_at: Duration,
    monitors: BTreeMap<String, Monitor>,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("horizon", &self.horizon)
            .field("labels", &self.monitors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PerformanceMonitor {
    pub fn new(clock: SharedClock, horizon: Duration) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            horizon,
            started_at,
            monitors: BTreeMap::new(),
        }
    }

    pub fn start_measuring(&self, label: &str) -> Measurement {
        Measurement {
            label: label.to_string(),
            start: self.clock.now(),
        }
    }

    /// Record a sample directly
    pub fn record(&mut self, label: &str, timestamp: Duration, duration: Duration) {
        let (horizon, started_at) = (self.horizon, self.started_at);
        self.monitors
            .entry(label.to_string())
            .or_insert_with(|| Monitor::new(horizon, started_at))
            .record(Sample {
                timestamp,
                duration,
            });
    }

    pub fn fps(&self, label: &str) -> f64 {
        self.monitors.get(label).map_or(0.0, Monitor::fps)
    }

    pub fn average(&self, label: &str) -> Duration {
        self.monitors
            .get(label)
            .map_or(Duration::ZERO, Monitor::average)
    }

    pub fn monitor(&self, label: &str) -> Option<&Monitor> {
        self.monitors.get(label)
    }

    /// Drop every sample and restart the window clock
    pub fn reset(&mut self) {
        self.monitors.clear();
        self.started_at = self.clock.now();
    }

    /// Every monitor's statistics, ordered by label
    pub fn dump(&self) -> Vec<MonitorStats> {
        self.monitors
            .iter()
            .map(|(label, monitor)| MonitorStats {
                label: label.clone(),
                fps: monitor.fps(),
                average_ms: monitor.average().as_secs_f64() * 1000.0,
                samples: monitor.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_measurement_records_elapsed() {
        let clock = ManualClock::new();
        let mut perf = PerformanceMonitor::new(clock.shared(), ms(3000));

        let measurement = perf.start_measuring("draw");
        clock.advance(ms(5));
        let elapsed = measurement.complete(&mut perf);

        assert_eq!(elapsed, ms(5));
        assert_eq!(perf.average("draw"), ms(5));
        assert_eq!(perf.monitor("draw").unwrap().len(), 1);
    }

    #[test]
    fn test_prune_moves_window_to_oldest_retained() {
        let mut monitor = Monitor::new(ms(3000), Duration::ZERO);
        for t in [0, 1000, 2000, 3000, 4000, 5000] {
            monitor.record(Sample {
                timestamp: ms(t),
                duration: ms(1),
            });
        }

        // Cutoff 2000: samples at 2000..=5000 survive
        assert_eq!(monitor.len(), 4);
        assert_eq!(monitor.window_start(), ms(2000));
        let expected = 4.0 / 3.0;
        assert!((monitor.fps() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_samples_not_divided_by_horizon() {
        let mut monitor = Monitor::new(ms(3000), Duration::ZERO);
        monitor.record(Sample {
            timestamp: ms(10_000),
            duration: ms(1),
        });
        monitor.record(Sample {
            timestamp: ms(10_500),
            duration: ms(1),
        });

        // The reset time is far behind the horizon, so the window starts at
        // the first sample and both samples span 500 ms.
        assert_eq!(monitor.len(), 2);
        assert_eq!(monitor.window_start(), ms(10_000));
        assert!((monitor.fps() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_everything() {
        let clock = ManualClock::new();
        let mut perf = PerformanceMonitor::new(clock.shared(), ms(3000));
        perf.record("main", ms(10), ms(2));
        perf.reset();
        assert_eq!(perf.fps("main"), 0.0);
        assert!(perf.dump().is_empty());
    }

    #[test]
    fn test_unknown_label_is_zero() {
        let clock = ManualClock::new();
        let perf = PerformanceMonitor::new(clock.shared(), ms(3000));
        assert_eq!(perf.fps("missing"), 0.0);
        assert_eq!(perf.average("missing"), Duration::ZERO);
    }

    #[test]
    fn test_dump_sorted_by_label() {
        let clock = ManualClock::new();
        let mut perf = PerformanceMonitor::new(clock.shared(), ms(3000));
        perf.record("ribbon", ms(10), ms(2));
        perf.record("main", ms(10), ms(4));
        let labels: Vec<_> = perf.dump().into_iter().map(|s| s.label).collect();
        assert_eq!(labels, ["main", "ribbon"]);
    }
}
