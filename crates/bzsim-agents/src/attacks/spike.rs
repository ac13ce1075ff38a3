use super::{AttackState, AttackType, ByzantineBehavior};
use crate::GroundTruth;
use bzsim_common::{ConfigError, NodeId};
use bzsim_interval::ConfidenceInterval;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// SPIKE parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeParams {
    /// Distance from the truth of every reading.
    pub magnitude: f64,
}

impl Default for SpikeParams {
    fn default() -> Self {
        SpikeParams { magnitude: 20.0 }
    }
}

/// Reports `truth +- magnitude` with a fair random sign.
#[derive(Debug, Clone)]
pub struct SpikeAttack {
    state: AttackState,
    params: SpikeParams,
}

impl SpikeAttack {
    /// Create a SPIKE attacker.
    pub fn new(
        node: NodeId,
        ground_truth: Arc<GroundTruth>,
        params: SpikeParams,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if !params.magnitude.is_finite() {
            return Err(ConfigError::out_of_range("magnitude", "must be finite"));
        }
        Ok(SpikeAttack {
            state: AttackState::new(node, ground_truth, seed),
            params,
        })
    }

    /// Parameters.
    pub fn params(&self) -> &SpikeParams {
        &self.params
    }
}

impl ByzantineBehavior for SpikeAttack {
    fn attack_type(&self) -> AttackType {
        AttackType::Spike
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
        let direction = if self.state.rng.gen::<f64>() < 0.5 { 1.0 } else { -1.0 };
        let reading = self.state.truth(time) + direction * self.params.magnitude;
        self.state.record(reading)
    }

    fn reset(&mut self) {
        self.state.clear();
    }
}
