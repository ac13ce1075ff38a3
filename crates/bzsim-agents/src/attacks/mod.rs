//! Byzantine attack strategies.
//!
//! Every attacker implements [`ByzantineBehavior`]: it produces a reading for
//! a point in time, optionally informed by the honest neighbourhood, and a
//! confidence interval for that reading. The set of strategies is closed and
//! stored as the [`ByzantineAttack`] enum.
//!
//! | Strategy   | Reading                                   | Interval                      |
//! |------------|-------------------------------------------|-------------------------------|
//! | MIMIC      | `truth + bias` (+ small noise once adapted) | widened to keep IoU overlap |
//! | SPIKE      | `truth +- magnitude`                      | default                       |
//! | DRIFT      | `truth + min(k * rate, max)`              | default                       |
//! | COLLIDER   | `truth + N(0, 0.5)`, jams the channel     | default                       |

mod collider;
mod drift;
mod mimic;
mod spike;

pub use collider::{ColliderAttack, ColliderParams};
pub use drift::{DriftAttack, DriftParams};
pub use mimic::{AttackEffectiveness, MimicAttack, MimicParams};
pub use spike::{SpikeAttack, SpikeParams};

use crate::GroundTruth;
use bzsim_common::{seeded_rng, ConfigError, NodeId};
use bzsim_interval::ConfidenceInterval;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Offset added to `seed + node_id` for attacker random streams, keeping
/// them apart from honest sensor streams.
pub const ATTACK_SEED_OFFSET: u64 = 1000;

/// Honest CI width assumed when the caller does not supply one.
pub const DEFAULT_HONEST_CI_WIDTH: f64 = 2.0;

// ============================================================================
// Attack Types
// ============================================================================

/// The closed set of attack strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttackType {
    /// IoU-passing bias injection.
    Mimic,
    /// Large outliers.
    Spike,
    /// Slowly growing bias.
    Drift,
    /// Channel jamming.
    Collider,
}

impl AttackType {
    /// All strategies.
    pub const ALL: [AttackType; 4] = [
        AttackType::Mimic,
        AttackType::Spike,
        AttackType::Drift,
        AttackType::Collider,
    ];

    /// Canonical upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            AttackType::Mimic => "MIMIC",
            AttackType::Spike => "SPIKE",
            AttackType::Drift => "DRIFT",
            AttackType::Collider => "COLLIDER",
        }
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttackType {
    type Err = ConfigError;

    /// Parse a strategy name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttackType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownAttackType(s.to_string()))
    }
}

// ============================================================================
// Shared State and Contract
// ============================================================================

/// State common to every attacker.
#[derive(Debug, Clone)]
pub struct AttackState {
    node: NodeId,
    ground_truth: Arc<GroundTruth>,
    rng: ChaCha8Rng,
    num_attacks: u64,
    last_value: Option<f64>,
}

impl AttackState {
    fn new(node: NodeId, ground_truth: Arc<GroundTruth>, seed: u64) -> Self {
        AttackState {
            node,
            ground_truth,
            rng: seeded_rng(seed, node.index() as u64 + ATTACK_SEED_OFFSET),
            num_attacks: 0,
            last_value: None,
        }
    }

    /// Node this attacker controls.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Readings emitted since construction or the last reset.
    pub fn num_attacks(&self) -> u64 {
        self.num_attacks
    }

    /// Most recent reading.
    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    fn truth(&self, time: f64) -> f64 {
        self.ground_truth.get_value(time)
    }

    fn record(&mut self, reading: f64) -> f64 {
        self.num_attacks += 1;
        self.last_value = Some(reading);
        reading
    }

    fn clear(&mut self) {
        self.num_attacks = 0;
        self.last_value = None;
    }
}

/// `reading +- w`, where `w` is the supplied honest CI width (2.0 if absent).
pub fn default_confidence_interval(
    reading: f64,
    honest_ci_width: Option<f64>,
) -> Result<ConfidenceInterval, ConfigError> {
    ConfidenceInterval::centered(reading, honest_ci_width.unwrap_or(DEFAULT_HONEST_CI_WIDTH))
}

/// Reading and interval generation shared by all attack strategies.
pub trait ByzantineBehavior {
    /// Strategy implemented.
    fn attack_type(&self) -> AttackType;

    /// Shared counters.
    fn state(&self) -> &AttackState;

    /// Adversarial reading at `time`.
    ///
    /// The neighbourhood estimate and CI are whatever the consensus layer
    /// reports about honest nodes this round; strategies may ignore them.
    fn generate_reading(
        &mut self,
        time: f64,
        neighborhood_estimate: Option<f64>,
        neighborhood_ci: Option<&ConfidenceInterval>,
    ) -> f64;

    /// Interval to report alongside `reading`.
    fn generate_confidence_interval(
        &self,
        reading: f64,
        honest_ci_width: Option<f64>,
    ) -> Result<ConfidenceInterval, ConfigError> {
        default_confidence_interval(reading, honest_ci_width)
    }

    /// Clear counters and any accumulated bias.
    fn reset(&mut self);

    /// Node this attacker controls.
    fn node(&self) -> NodeId {
        self.state().node()
    }
}

// ============================================================================
// Closed Attack Set
// ============================================================================

/// Any attacker.
#[derive(Debug, Clone)]
pub enum ByzantineAttack {
    /// MIMIC attacker.
    Mimic(MimicAttack),
    /// SPIKE attacker.
    Spike(SpikeAttack),
    /// DRIFT attacker.
    Drift(DriftAttack),
    /// COLLIDER attacker.
    Collider(ColliderAttack),
}

impl ByzantineAttack {
    /// Build an attacker of `attack_type` with default parameters.
    pub fn with_defaults(
        attack_type: AttackType,
        node: NodeId,
        ground_truth: Arc<GroundTruth>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        Ok(match attack_type {
            AttackType::Mimic => ByzantineAttack::Mimic(MimicAttack::new(
                node,
                ground_truth,
                MimicParams::default(),
                seed,
            )?),
            AttackType::Spike => ByzantineAttack::Spike(SpikeAttack::new(
                node,
                ground_truth,
                SpikeParams::default(),
                seed,
            )?),
            AttackType::Drift => ByzantineAttack::Drift(DriftAttack::new(
                node,
                ground_truth,
                DriftParams::default(),
                seed,
            )?),
            AttackType::Collider => ByzantineAttack::Collider(ColliderAttack::new(
                node,
                ground_truth,
                ColliderParams::default(),
                seed,
            )?),
        })
    }

    fn behavior(&self) -> &dyn ByzantineBehavior {
        match self {
            ByzantineAttack::Mimic(a) => a,
            ByzantineAttack::Spike(a) => a,
            ByzantineAttack::Drift(a) => a,
            ByzantineAttack::Collider(a) => a,
        }
    }

    fn behavior_mut(&mut self) -> &mut dyn ByzantineBehavior {
        match self {
            ByzantineAttack::Mimic(a) => a,
            ByzantineAttack::Spike(a) => a,
            ByzantineAttack::Drift(a) => a,
            ByzantineAttack::Collider(a) => a,
        }
    }

    /// Decide whether to jam this round. Only COLLIDER attackers ever jam.
    pub fn should_jam(&mut self) -> bool {
        match self {
            ByzantineAttack::Collider(a) => a.should_jam(),
            _ => false,
        }
    }
}

impl ByzantineBehavior for ByzantineAttack {
    fn attack_type(&self) -> AttackType {
        self.behavior().attack_type()
    }

    fn state(&self) -> &AttackState {
        self.behavior().state()
    }

    fn generate_reading(
        &mut self,
        time: f64,
        neighborhood_estimate: Option<f64>,
        neighborhood_ci: Option<&ConfidenceInterval>,
    ) -> f64 {
        self.behavior_mut()
            .generate_reading(time, neighborhood_estimate, neighborhood_ci)
    }

    fn generate_confidence_interval(
        &self,
        reading: f64,
        honest_ci_width: Option<f64>,
    ) -> Result<ConfidenceInterval, ConfigError> {
        self.behavior()
            .generate_confidence_interval(reading, honest_ci_width)
    }

    fn reset(&mut self) {
        self.behavior_mut().reset()
    }
}

impl fmt::Display for ByzantineAttack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(id={}, attacks={})",
            self.attack_type(),
            self.node(),
            self.state().num_attacks()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truth() -> Arc<GroundTruth> {
        Arc::new(GroundTruth::constant(25.0).unwrap())
    }

    #[test]
    fn test_attack_type_parsing() {
        assert_eq!("mimic".parse::<AttackType>().unwrap(), AttackType::Mimic);
        assert_eq!("SPIKE".parse::<AttackType>().unwrap(), AttackType::Spike);
        assert_eq!(" Drift ".parse::<AttackType>().unwrap(), AttackType::Drift);
        assert_eq!("collider".parse::<AttackType>().unwrap(), AttackType::Collider);
        assert_eq!(
            "random".parse::<AttackType>(),
            Err(ConfigError::UnknownAttackType("random".into()))
        );
        assert_eq!(serde_json::to_string(&AttackType::Mimic).unwrap(), "\"MIMIC\"");
    }

    #[test]
    fn test_default_interval_uses_width_as_half_width() {
        let ci = default_confidence_interval(10.0, None).unwrap();
        assert_eq!(ci.bounds(), (8.0, 12.0));
        let ci = default_confidence_interval(10.0, Some(0.5)).unwrap();
        assert_eq!(ci.bounds(), (9.5, 10.5));
        assert!(default_confidence_interval(10.0, Some(-1.0)).is_err());
    }

    #[test]
    fn test_with_defaults_builds_every_type() {
        for (i, kind) in AttackType::ALL.into_iter().enumerate() {
            let mut attack = ByzantineAttack::with_defaults(kind, NodeId(i), truth(), 42).unwrap();
            assert_eq!(attack.attack_type(), kind);
            assert_eq!(attack.node(), NodeId(i));

            let reading = attack.generate_reading(0.0, None, None);
            assert!(reading.is_finite());
            assert_eq!(attack.state().num_attacks(), 1);
            assert_eq!(attack.state().last_value(), Some(reading));
            assert!(attack.generate_confidence_interval(reading, None).unwrap().contains(reading));

            attack.reset();
            assert_eq!(attack.state().num_attacks(), 0);
            assert_eq!(attack.state().last_value(), None);
        }
    }

    #[test]
    fn test_only_colliders_jam() {
        let mut spike = ByzantineAttack::with_defaults(AttackType::Spike, NodeId(0), truth(), 1).unwrap();
        assert!((0..100).all(|_| !spike.should_jam()));

        let mut collider =
            ByzantineAttack::with_defaults(AttackType::Collider, NodeId(0), truth(), 1).unwrap();
        assert!((0..100).any(|_| collider.should_jam()));
    }

    #[test]
    fn test_display() {
        let mut attack = ByzantineAttack::with_defaults(AttackType::Drift, NodeId(4), truth(), 0).unwrap();
        attack.generate_reading(0.0, None, None);
        assert_eq!(attack.to_string(), "DRIFT(id=4, attacks=1)");
    }
}
