//! Core types for Steptally
//!
//! This module defines the data structures that flow through the tally: raw
//! accelerometer samples, detector state, accepted step events and the daily
//! records kept by the store.

use serde::{Deserialize, Serialize};

/// Identifier assigned by the store to each committed record
pub type RecordId = i64;

/// One 3-axis accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Milliseconds on the sensor's clock
    pub timestamp_ms: i64,
}

impl AccelerationSample {
    pub fn new(x: f32, y: f32, z: f32, timestamp_ms: i64) -> Self {
        Self { x, y, z, timestamp_ms }
    }

    /// Euclidean norm of the acceleration vector.
    ///
    /// Gravity is not removed, so a device at rest reads roughly 9.8.
    pub fn magnitude(&self) -> f64 {
        let x = f64::from(self.x);
        let y = f64::from(self.y);
        let z = f64::from(self.z);
        (x * x + y * y + z * z).sqrt()
    }
}

/// State carried between detector invocations
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectorState {
    /// Magnitude of the most recent sample, accepted or not
    pub previous_magnitude: f64,
    /// Timestamp of the last accepted step
    pub last_step_timestamp_ms: i64,
    /// Steps counted since the last reset or commit
    pub running_step_count: u32,
}

impl DetectorState {
    /// Fresh state carrying a restored running count.
    pub fn with_running_count(running_step_count: u32) -> Self {
        Self {
            running_step_count,
            ..Self::default()
        }
    }
}

/// An accepted step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub timestamp_ms: i64,
    pub magnitude: f64,
    /// Running count including this step
    pub running_step_count: u32,
}

/// A committed daily tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: RecordId,
    pub step_count: u32,
    /// Calendar date (YYYY-MM-DD)
    pub date: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude_is_euclidean_norm() {
        let sample = AccelerationSample::new(3.0, 4.0, 12.0, 0);
        assert!((sample.magnitude() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_json_shape() {
        let sample: AccelerationSample =
            serde_json::from_str(r#"{"x": 1.0, "y": -2.5, "z": 9.8, "timestamp_ms": 1200}"#)
                .unwrap();
        assert_eq!(sample.timestamp_ms, 1200);
        assert_eq!(sample.y, -2.5);
    }

    #[test]
    fn test_state_with_running_count() {
        let state = DetectorState::with_running_count(42);
        assert_eq!(state.running_step_count, 42);
        assert_eq!(state.previous_magnitude, 0.0);
        assert_eq!(state.last_step_timestamp_ms, 0);
    }
}
