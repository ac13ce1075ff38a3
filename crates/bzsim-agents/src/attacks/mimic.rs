use super::{AttackState, AttackType, ByzantineBehavior, DEFAULT_HONEST_CI_WIDTH};
use crate::GroundTruth;
use bzsim_common::{ConfigError, NodeId};
use bzsim_interval::ConfidenceInterval;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Plausibility noise added once the attacker has adapted to the neighbourhood.
const ADAPTED_NOISE_STD: f64 = 0.1;

/// Half-width growth applied when the crafted CI overlaps too little.
const WIDEN_FACTOR: f64 = 1.5;

/// MIMIC parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MimicParams {
    /// Bias added to the truth.
    pub bias: f64,
    /// IoU with the honest CI the attacker tries to keep.
    pub iou_target: f64,
    /// Reported CI width relative to the honest width.
    pub ci_width_multiplier: f64,
}

impl Default for MimicParams {
    fn default() -> Self {
        MimicParams {
            bias: 0.5,
            iou_target: 0.20,
            ci_width_multiplier: 1.2,
        }
    }
}

/// How far a consensus estimate was pulled by a MIMIC attacker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackEffectiveness {
    /// Always [`AttackType::Mimic`].
    pub attack_type: AttackType,
    /// Configured bias.
    pub intended_bias: f64,
    /// `consensus - truth`.
    pub achieved_bias: f64,
    /// At least half of the intended bias was achieved.
    pub success: bool,
    /// Readings emitted.
    pub attacks_performed: u64,
}

/// Injects a constant bias while crafting CIs that still overlap the honest ones.
#[derive(Debug, Clone)]
pub struct MimicAttack {
    state: AttackState,
    params: MimicParams,
    noise: Normal<f64>,
    last_honest_estimate: Option<f64>,
    last_honest_ci: Option<ConfidenceInterval>,
}

impl MimicAttack {
    /// Create a MIMIC attacker.
    pub fn new(
        node: NodeId,
        ground_truth: Arc<GroundTruth>,
        params: MimicParams,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if !params.bias.is_finite() {
            return Err(ConfigError::out_of_range("bias", "must be finite"));
        }
        if !(0.0..=1.0).contains(&params.iou_target) {
            return Err(ConfigError::out_of_range(
                "iou_target",
                format!("must be in [0, 1], got {}", params.iou_target),
            ));
        }
        if !(params.ci_width_multiplier.is_finite() && params.ci_width_multiplier > 0.0) {
            return Err(ConfigError::out_of_range(
                "ci_width_multiplier",
                format!("must be positive, got {}", params.ci_width_multiplier),
            ));
        }
        let noise = Normal::new(0.0, ADAPTED_NOISE_STD)
            .map_err(|e| ConfigError::out_of_range("noise_std", e.to_string()))?;

        Ok(MimicAttack {
            state: AttackState::new(node, ground_truth, seed),
            params,
            noise,
            last_honest_estimate: None,
            last_honest_ci: None,
        })
    }

    /// Parameters.
    pub fn params(&self) -> &MimicParams {
        &self.params
    }

    /// Last neighbourhood estimate observed.
    pub fn last_honest_estimate(&self) -> Option<f64> {
        self.last_honest_estimate
    }

    /// Last neighbourhood CI observed.
    pub fn last_honest_ci(&self) -> Option<&ConfidenceInterval> {
        self.last_honest_ci.as_ref()
    }

    /// Compare a consensus estimate with the truth at `t = 0`.
    pub fn attack_effectiveness(&self, consensus_estimate: f64) -> AttackEffectiveness {
        let achieved_bias = consensus_estimate - self.state.truth(0.0);
        AttackEffectiveness {
            attack_type: AttackType::Mimic,
            intended_bias: self.params.bias,
            achieved_bias,
            success: achieved_bias.abs() >= self.params.bias.abs() * 0.5,
            attacks_performed: self.state.num_attacks,
        }
    }
}

impl ByzantineBehavior for MimicAttack {
    fn attack_type(&self) -> AttackType {
        AttackType::Mimic
    }

    fn state(&self) -> &AttackState {
        &self.state
    }

    /// `truth + bias`, plus N(0, 0.1) once a neighbourhood CI is known.
    ///
    /// A supplied estimate replaces the remembered estimate and CI, even when
    /// the CI itself is absent.
    fn generate_reading(
        &mut self,
        time: f64,
        neighborhood_estimate: Option<f64>,
        neighborhood_ci: Option<&ConfidenceInterval>,
    ) -> f64 {
        if let Some(estimate) = neighborhood_estimate {
            self.last_honest_estimate = Some(estimate);
            self.last_honest_ci = neighborhood_ci.copied();
        }

        let mut reading = self.state.truth(time) + self.params.bias;
        if self.last_honest_ci.is_some() {
            reading += self.noise.sample(&mut self.state.rng);
        }
        self.state.record(reading)
    }

    /// Centered on `reading`, `honest_ci_width * multiplier` wide.
    ///
    /// When the candidate strictly overlaps the remembered honest CI with an
    /// IoU below target, the half-width grows by 1.5 once. Disjoint
    /// candidates are returned unchanged.
    fn generate_confidence_interval(
        &self,
        reading: f64,
        honest_ci_width: Option<f64>,
    ) -> Result<ConfidenceInterval, ConfigError> {
        let width = honest_ci_width.unwrap_or(DEFAULT_HONEST_CI_WIDTH) * self.params.ci_width_multiplier;
        let mut half_width = width / 2.0;

        if let Some(honest) = &self.last_honest_ci {
            let lower = reading - half_width;
            let upper = reading + half_width;
            let overlap_lower = lower.max(honest.lower());
            let overlap_upper = upper.min(honest.upper());

            if overlap_upper > overlap_lower {
                let hull = upper.max(honest.upper()) - lower.min(honest.lower());
                let iou = if hull > 0.0 {
                    (overlap_upper - overlap_lower) / hull
                } else {
                    0.0
                };
                if iou < self.params.iou_target {
                    half_width *= WIDEN_FACTOR;
                }
            }
        }

        ConfidenceInterval::centered(reading, half_width)
    }

    /// Clears counters only; the remembered neighbourhood is kept.
    fn reset(&mut self) {
        self.state.clear();
    }
}
