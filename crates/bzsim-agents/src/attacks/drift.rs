use super::{AttackState, AttackType, ByzantineBehavior};
use crate::GroundTruth;
use bzsim_common::{ConfigError, NodeId};
use bzsim_interval::ConfidenceInterval;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// DRIFT parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftParams {
    /// Bias added per reading.
    pub rate: f64,
    /// Cap on the accumulated bias.
    pub max_drift: f64,
}

impl Default for DriftParams {
    fn default() -> Self {
        DriftParams {
            rate: 0.1,
            max_drift: 5.0,
        }
    }
}

/// Reports the truth plus a bias that grows by `rate` per reading up to `max_drift`.
#[derive(Debug, Clone)]
pub struct DriftAttack {
    state: AttackState,
    params: DriftParams,
    current_drift: f64,
}

impl DriftAttack {
    /// Create a DRIFT attacker.
    pub fn new(
        node: NodeId,
        ground_truth: Arc<GroundTruth>,
        params: DriftParams,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if !params.rate.is_finite() || !params.max_drift.is_finite() {
            return Err(ConfigError::out_of_range("drift", "rate and max_drift must be finite"));
        }
        Ok(DriftAttack {
            state: AttackState::new(node, ground_truth, seed),
            params,
            current_drift: 0.0,
        })
    }

    /// Parameters.
    pub fn params(&self) -> &DriftParams {
        &self.params
    }

    /// Bias applied to the last reading.
    pub fn current_drift(&self) -> f64 {
        self.current_drift
    }
}

impl ByzantineBehavior for DriftAttack {
    fn attack_type(&self) -> AttackType {
        AttackType::Drift
    }

    fn state(&self) -> &AttackState {
        &self.state
    }

    fn generate_reading(
        &mut self,
        time: f64,
        _neighborhood_estimate: Option<f64>,
        _neighborhood_ci: Option<&ConfidenceInterval>,
    ) -> f64 {
        self.current_drift = (self.current_drift + self.params.rate).min(self.params.max_drift);
        let reading = self.state.truth(time) + self.current_drift;
        self.state.record(reading)
    }

    fn reset(&mut self) {
        self.state.clear();
        self.current_drift = 0.0;
    }
}
