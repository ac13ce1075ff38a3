use super::{AttackState, AttackType, ByzantineBehavior};
use crate::GroundTruth;
use bzsim_common::{ConfigError, NodeId};
use bzsim_interval::ConfidenceInterval;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Noise on COLLIDER readings; the attack happens on the channel, not in the value.
const READING_NOISE_STD: f64 = 0.5;

/// COLLIDER parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderParams {
    /// Probability of jamming in a round.
    pub jamming_probability: f64,
}

impl Default for ColliderParams {
    fn default() -> Self {
        ColliderParams {
            jamming_probability: 0.3,
        }
    }
}

/// Reports plausible readings and jams the channel at random.
#[derive(Debug, Clone)]
pub struct ColliderAttack {
    state: AttackState,
    params: ColliderParams,
    noise: Normal<f64>,
    jamming_packets_sent: u64,
}

impl ColliderAttack {
    /// Create a COLLIDER attacker.
    pub fn new(
        node: NodeId,
        ground_truth: Arc<GroundTruth>,
        params: ColliderParams,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&params.jamming_probability) {
            return Err(ConfigError::out_of_range(
                "jamming_probability",
                format!("must be in [0, 1], got {}", params.jamming_probability),
            ));
        }
        let noise = Normal::new(0.0, READING_NOISE_STD)
            .map_err(|e| ConfigError::out_of_range("noise_std", e.to_string()))?;

        Ok(ColliderAttack {
            state: AttackState::new(node, ground_truth, seed),
            params,
            noise,
            jamming_packets_sent: 0,
        })
    }

    /// Parameters.
    pub fn params(&self) -> &ColliderParams {
        &self.params
    }

    /// Jamming decisions taken since construction or the last reset.
    pub fn jamming_packets_sent(&self) -> u64 {
        self.jamming_packets_sent
    }

    /// Bernoulli draw: jam this round?
    pub fn should_jam(&mut self) -> bool {
        if self.state.rng.gen::<f64>() < self.params.jamming_probability {
            self.jamming_packets_sent += 1;
            trace!("Collider {}: jamming ({} so far)", self.state.node, self.jamming_packets_sent);
            true
        } else {
            false
        }
    }
}

impl ByzantineBehavior for ColliderAttack {
    fn attack_type(&self) -> AttackType {
        AttackType::Collider
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
        let reading = self.state.truth(time) + self.noise.sample(&mut self.state.rng);
        self.state.record(reading)
    }

    fn reset(&mut self) {
        self.state.clear();
        self.jamming_packets_sent = 0;
    }
}
