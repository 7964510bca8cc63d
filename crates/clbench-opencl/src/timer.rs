//! Wall-clock lap timing.
//!
//! A [`Timer`] records one lap per call to [`Timer::next_lap`]: the time
//! elapsed since the previous lap (or since the timer was started). Lap
//! statistics use the arithmetic mean and the sample (Bessel-corrected)
//! standard deviation.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Collects per-trial durations in seconds.
#[derive(Debug, Clone)]
pub struct Timer {
    last: Instant,
    laps: Vec<f64>,
}

impl Timer {
    /// Start a timer with no laps recorded.
    pub fn start() -> Self {
        Self { last: Instant::now(), laps: Vec::new() }
    }

    /// Move the lap reference point to now without recording anything.
    pub fn restart(&mut self) {
        self.last = Instant::now();
    }

    /// Close the current lap and start the next one.
    pub fn next_lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now.duration_since(self.last);
        self.last = now;
        self.laps.push(lap.as_secs_f64());
        lap
    }

    /// Record an externally measured lap.
    pub fn record(&mut self, lap: Duration) {
        self.laps.push(lap.as_secs_f64());
    }

    pub fn laps(&self) -> &[f64] {
        &self.laps
    }

    pub fn stats(&self) -> LapStats {
        LapStats::from_laps(&self.laps)
    }
}

/// Summary of a series of laps, all in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapStats {
    pub laps: usize,
    pub mean_s: f64,
    pub std_dev_s: f64,
    pub min_s: f64,
    pub max_s: f64,
}

impl LapStats {
    /// Compute statistics over `laps`.
    ///
    /// An empty series yields all zeros; fewer than two laps have a zero
    /// standard deviation.
    pub fn from_laps(laps: &[f64]) -> Self {
        if laps.is_empty() {
            return Self { laps: 0, mean_s: 0.0, std_dev_s: 0.0, min_s: 0.0, max_s: 0.0 };
        }

        let n = laps.len() as f64;
        let mean = laps.iter().sum::<f64>() / n;
        let std_dev = if laps.len() < 2 {
            0.0
        } else {
            let variance = laps.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        };
        let min = laps.iter().copied().fold(f64::INFINITY, f64::min);
        let max = laps.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self { laps: laps.len(), mean_s: mean, std_dev_s: std_dev, min_s: min, max_s: max }
    }
}

impl std::fmt::Display for LapStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+-{} s", self.mean_s, self.std_dev_s)
    }
}
