//! # bzsim-agents
//!
//! Sensor population for the bzsim testbed.
//!
//! This crate provides:
//!
//! - [`GroundTruth`] - the piecewise-constant true value all sensors observe.
//!
//! - [`HonestSensor`] - reports the truth plus Gaussian noise and a `k * sigma`
//!   confidence interval.
//!
//! - [`ByzantineAttack`] - the closed family of adversarial strategies
//!   (MIMIC, SPIKE, DRIFT, COLLIDER) behind one [`ByzantineBehavior`] contract.
//!
//! - [`SensorFactory`] - partitions a population into honest and Byzantine
//!   nodes and assigns attack strategies.
//!
//! Every sensor owns its random stream, keyed by the global seed plus a
//! per-node offset, so populations are reproducible and `Send`.

pub mod attacks;
pub mod factory;
pub mod ground_truth;
pub mod honest;

pub use attacks::{
    AttackEffectiveness, AttackState, AttackType, ByzantineAttack, ByzantineBehavior,
    ColliderAttack, ColliderParams, DriftAttack, DriftParams, MimicAttack, MimicParams,
    SpikeAttack, SpikeParams,
};
pub use factory::{AttackMix, NetworkSummary, PopulationConfig, SensorFactory, SensorNetwork};
pub use ground_truth::{GroundTruth, GroundTruthChange};
pub use honest::HonestSensor;

use bzsim_common::NodeId;
use serde::Serialize;

/// What a node is in the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorRole {
    /// Honest sensor.
    Honest,
    /// Byzantine attacker running the given strategy.
    Byzantine(AttackType),
}

/// One member of a population.
#[derive(Debug, Clone)]
pub enum Sensor {
    /// Honest sensor.
    Honest(HonestSensor),
    /// Byzantine attacker.
    Byzantine(ByzantineAttack),
}

impl Sensor {
    /// Node this sensor belongs to.
    pub fn node(&self) -> NodeId {
        match self {
            Sensor::Honest(s) => s.node(),
            Sensor::Byzantine(a) => a.node(),
        }
    }

    /// Role in the population.
    pub fn role(&self) -> SensorRole {
        match self {
            Sensor::Honest(_) => SensorRole::Honest,
            Sensor::Byzantine(a) => SensorRole::Byzantine(a.attack_type()),
        }
    }

    /// Whether this node is Byzantine.
    pub fn is_byzantine(&self) -> bool {
        matches!(self, Sensor::Byzantine(_))
    }

    /// Clear reading statistics.
    pub fn reset(&mut self) {
        match self {
            Sensor::Honest(s) => s.reset(),
            Sensor::Byzantine(a) => a.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_population_types_are_send() {
        assert_send::<Sensor>();
        assert_send::<SensorNetwork>();
    }

    #[test]
    fn test_sensor_roles() {
        let truth = Arc::new(GroundTruth::constant(1.0).unwrap());
        let honest = Sensor::Honest(HonestSensor::new(NodeId(0), truth.clone(), 0.5, 1).unwrap());
        let byz = Sensor::Byzantine(
            ByzantineAttack::with_defaults(AttackType::Spike, NodeId(1), truth, 1).unwrap(),
        );
        assert_eq!(honest.role(), SensorRole::Honest);
        assert!(!honest.is_byzantine());
        assert_eq!(byz.role(), SensorRole::Byzantine(AttackType::Spike));
        assert_eq!(byz.node(), NodeId(1));
    }
}
