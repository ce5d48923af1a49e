//! Step detection
//!
//! A step is accepted when a sample's magnitude clears the threshold, the
//! cooldown since the previous step has elapsed, and the magnitude is rising
//! relative to the previous sample. The rising check looks only one sample back,
//! so steps register on the way up to a peak rather than at its apex.

use crate::config::DetectorConfig;
use crate::types::{AccelerationSample, DetectorState, StepEvent};

/// Apply the detection rule to one sample.
///
/// Returns whether a step was accepted and the state to carry forward. The
/// previous magnitude is replaced on every call, accepted or not.
pub fn detect_step(
    sample: &AccelerationSample,
    state: &DetectorState,
    config: &DetectorConfig,
) -> (bool, DetectorState) {
    let magnitude = sample.magnitude();

    let detected = magnitude > config.threshold
        && sample.timestamp_ms.saturating_sub(state.last_step_timestamp_ms) > config.cooldown_ms
        && magnitude > state.previous_magnitude;

    let mut next = *state;
    if detected {
        next.running_step_count = next.running_step_count.saturating_add(1);
        next.last_step_timestamp_ms = sample.timestamp_ms;
    }
    next.previous_magnitude = magnitude;

    (detected, next)
}

/// Stateful wrapper around [`detect_step`]
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: DetectorConfig,
    state: DetectorState,
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl StepDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::default(),
        }
    }

    /// Create a detector that continues counting from a restored total
    pub fn with_running_count(config: DetectorConfig, running_step_count: u32) -> Self {
        Self {
            config,
            state: DetectorState::with_running_count(running_step_count),
        }
    }

    /// Process a single sample, returning the step event if one was accepted
    pub fn process_sample(&mut self, sample: &AccelerationSample) -> Option<StepEvent> {
        let (detected, next) = detect_step(sample, &self.state, &self.config);
        self.state = next;

        if !detected {
            return None;
        }

        log::debug!(
            "step at {} ms (magnitude {:.2}, running {})",
            sample.timestamp_ms,
            next.previous_magnitude,
            next.running_step_count
        );

        Some(StepEvent {
            timestamp_ms: sample.timestamp_ms,
            magnitude: next.previous_magnitude,
            running_step_count: next.running_step_count,
        })
    }

    /// Process a batch of samples and return all accepted steps
    pub fn process_batch(&mut self, samples: &[AccelerationSample]) -> Vec<StepEvent> {
        samples
            .iter()
            .filter_map(|sample| self.process_sample(sample))
            .collect()
    }

    /// Zero the running count.
    ///
    /// Magnitude and cooldown tracking are kept so a reset mid-stride does not
    /// immediately accept the same peak again.
    pub fn reset_count(&mut self) {
        self.state.running_step_count = 0;
    }

    pub fn running_count(&self) -> u32 {
        self.state.running_step_count
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}
