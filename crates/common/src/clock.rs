//! Clock and pacing utilities for clip capture.
//!
//! A recording session is anchored to a monotonic epoch taken when the
//! encoder starts. This module provides:
//! - The session clock (elapsed time since the encoder started)
//! - Drift measurement between audio playback progress and the session clock
//! - Frame pacing for capturing a surface at a fixed rate

use std::time::Instant;

/// A monotonic clock anchored to the moment a recording began.
#[derive(Debug, Clone)]
pub struct RecordingClock {
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339).
    epoch_wall: String,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Nanoseconds elapsed since the epoch.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Seconds elapsed since the epoch.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at the epoch.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Convert nanoseconds to seconds.
    pub fn ns_to_secs(ns: u64) -> f64 {
        ns as f64 / 1_000_000_000.0
    }

    /// Convert seconds to nanoseconds. Negative input saturates at zero.
    pub fn secs_to_ns(secs: f64) -> u64 {
        (secs.max(0.0) * 1_000_000_000.0) as u64
    }
}

/// Drift between a reference timeline and a measured one.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Position on the reference timeline (ns).
    pub reference_ns: u64,
    /// Position on the measured timeline (ns).
    pub measured_ns: u64,
}

impl DriftMeasurement {
    /// Build a measurement from two positions expressed in seconds.
    pub fn from_secs(reference_secs: f64, measured_secs: f64) -> Self {
        Self {
            reference_ns: RecordingClock::secs_to_ns(reference_secs),
            measured_ns: RecordingClock::secs_to_ns(measured_secs),
        }
    }

    /// Drift in nanoseconds (positive = measured is ahead).
    pub fn drift_ns(&self) -> i64 {
        self.measured_ns as i64 - self.reference_ns as i64
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_ns() as f64 / 1_000_000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

/// Paces frame delivery to a target rate.
///
/// The display loop may present faster than the capture rate; a surface
/// capture consults this controller to decide which presented frames reach
/// the encoder.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate. Zero is treated as 1 Hz.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Returns true and records the tick if enough time has passed.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                // Advance on the grid so a slow presenter does not accumulate lag.
                let behind = (current_ns - last) / self.target_interval_ns;
                self.last_tick_ns = Some(last + behind * self.target_interval_ns);
                true
            }
            _ => false,
        }
    }

    /// Forget the last tick so the next call fires immediately.
    pub fn reset(&mut self) {
        self.last_tick_ns = None;
    }
}
