//! Time-indexed true value observed by the sensor population.

use bzsim_common::ConfigError;
use serde::{Deserialize, Serialize};

/// A step in the ground truth: from `time` on, the true value is `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthChange {
    /// Simulation time in seconds.
    pub time: f64,
    /// New true value.
    pub value: f64,
}

impl GroundTruthChange {
    /// Create a change.
    pub fn new(time: f64, value: f64) -> Self {
        GroundTruthChange { time, value }
    }
}

/// Piecewise-constant ground truth.
///
/// The value at `t` is that of the last change with `time <= t` (left-closed
/// steps). Before the first change the first change's value applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GroundTruthChange>", into = "Vec<GroundTruthChange>")]
pub struct GroundTruth {
    changes: Vec<GroundTruthChange>,
}

impl GroundTruth {
    /// Build from a list of changes in any order.
    ///
    /// Fails on an empty list, negative or non-finite times, or non-finite values.
    pub fn new(mut changes: Vec<GroundTruthChange>) -> Result<Self, ConfigError> {
        if changes.is_empty() {
            return Err(ConfigError::InvalidGroundTruth(
                "at least one change is required".into(),
            ));
        }
        if let Some(bad) = changes.iter().find(|c| !c.time.is_finite() || c.time < 0.0) {
            return Err(ConfigError::InvalidGroundTruth(format!(
                "change time must be finite and non-negative, got {}",
                bad.time
            )));
        }
        if let Some(bad) = changes.iter().find(|c| !c.value.is_finite()) {
            return Err(ConfigError::InvalidGroundTruth(format!(
                "change value must be finite, got {}",
                bad.value
            )));
        }

        // Stable: equal timestamps keep their given order, the later one wins.
        changes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(GroundTruth { changes })
    }

    /// Ground truth that never changes.
    pub fn constant(value: f64) -> Result<Self, ConfigError> {
        Self::new(vec![GroundTruthChange::new(0.0, value)])
    }

    /// True value at `time`.
    pub fn get_value(&self, time: f64) -> f64 {
        let idx = self.changes.partition_point(|c| c.time <= time);
        // `changes` is never empty.
        self.changes[idx.saturating_sub(1)].value
    }

    /// All changes, sorted by time.
    pub fn get_changes(&self) -> &[GroundTruthChange] {
        &self.changes
    }

    /// Time of the first change strictly after `current_time`.
    pub fn get_next_change_time(&self, current_time: f64) -> Option<f64> {
        self.changes
            .iter()
            .map(|c| c.time)
            .find(|&t| t > current_time)
    }

    /// Whether a change happened in `(last_check_time, current_time]`.
    pub fn has_changed_since(&self, last_check_time: f64, current_time: f64) -> bool {
        self.changes
            .iter()
            .any(|c| last_check_time < c.time && c.time <= current_time)
    }
}

impl TryFrom<Vec<GroundTruthChange>> for GroundTruth {
    type Error = ConfigError;

    fn try_from(changes: Vec<GroundTruthChange>) -> Result<Self, Self::Error> {
        GroundTruth::new(changes)
    }
}

impl From<GroundTruth> for Vec<GroundTruthChange> {
    fn from(truth: GroundTruth) -> Self {
        truth.changes
    }
}
