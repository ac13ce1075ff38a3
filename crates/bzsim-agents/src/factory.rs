//! Population construction: which nodes are Byzantine and how they attack.

use crate::attacks::{AttackType, ByzantineAttack, ByzantineBehavior};
use crate::honest::{HonestSensor, DEFAULT_NOISE_STD};
use crate::{GroundTruth, Sensor, SensorRole};
use bzsim_common::{seeded_rng, ConfigError, NodeId};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Attack Mix
// ============================================================================

/// Categorical distribution over attack strategies.
///
/// Order matters: categorical draws index the weights in the order given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(AttackType, f64)>", into = "Vec<(AttackType, f64)>")]
pub struct AttackMix {
    weights: Vec<(AttackType, f64)>,
}

impl AttackMix {
    /// Allowed deviation of the weight sum from 1.0.
    pub const SUM_TOLERANCE: f64 = 0.01;

    /// Validate a list of `(strategy, weight)` pairs.
    pub fn new(weights: Vec<(AttackType, f64)>) -> Result<Self, ConfigError> {
        if weights.is_empty() {
            return Err(ConfigError::AttackMixSum(0.0));
        }
        if let Some((kind, w)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::out_of_range(
                "attack_mix",
                format!("weight for {} must be finite and >= 0, got {}", kind, w),
            ));
        }
        let mut seen = HashSet::new();
        if let Some((kind, _)) = weights.iter().find(|(kind, _)| !seen.insert(*kind)) {
            return Err(ConfigError::out_of_range(
                "attack_mix",
                format!("{} listed more than once", kind),
            ));
        }

        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if (total - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(ConfigError::AttackMixSum(total));
        }
        Ok(AttackMix { weights })
    }

    /// Build from strategy names, matched case-insensitively.
    pub fn from_names<S: AsRef<str>>(weights: &[(S, f64)]) -> Result<Self, ConfigError> {
        let parsed = weights
            .iter()
            .map(|(name, w)| AttackType::from_str(name.as_ref()).map(|t| (t, *w)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(parsed)
    }

    /// `(strategy, weight)` pairs in draw order.
    pub fn weights(&self) -> &[(AttackType, f64)] {
        &self.weights
    }

    fn distribution(&self) -> Result<WeightedIndex<f64>, ConfigError> {
        WeightedIndex::new(self.weights.iter().map(|(_, w)| *w))
            .map_err(|e| ConfigError::out_of_range("attack_mix", e.to_string()))
    }
}

impl Default for AttackMix {
    fn default() -> Self {
        AttackMix {
            weights: vec![
                (AttackType::Mimic, 0.50),
                (AttackType::Collider, 0.20),
                (AttackType::Spike, 0.20),
                (AttackType::Drift, 0.10),
            ],
        }
    }
}

impl TryFrom<Vec<(AttackType, f64)>> for AttackMix {
    type Error = ConfigError;

    fn try_from(weights: Vec<(AttackType, f64)>) -> Result<Self, Self::Error> {
        AttackMix::new(weights)
    }
}

impl From<AttackMix> for Vec<(AttackType, f64)> {
    fn from(mix: AttackMix) -> Self {
        mix.weights
    }
}

// ============================================================================
// Population Configuration
// ============================================================================

/// Parameters of a sensor population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Total number of nodes.
    pub num_nodes: usize,
    /// Fraction of Byzantine nodes in `[0, 1]`.
    pub byzantine_fraction: f64,
    /// Honest sensor noise standard deviation.
    pub noise_std: f64,
    /// Distribution of attack strategies.
    pub attack_mix: AttackMix,
    /// Seed for role assignment and per-node streams.
    pub seed: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            num_nodes: 100,
            byzantine_fraction: 0.10,
            noise_std: DEFAULT_NOISE_STD,
            attack_mix: AttackMix::default(),
            seed: 42,
        }
    }
}

// ============================================================================
// Sensor Network
// ============================================================================

/// Composition of a population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSummary {
    /// All nodes.
    pub total_nodes: usize,
    /// Honest nodes.
    pub honest_nodes: usize,
    /// Byzantine nodes.
    pub byzantine_nodes: usize,
    /// `byzantine_nodes / total_nodes`.
    pub byzantine_fraction: f64,
    /// Attackers per strategy.
    pub attack_distribution: BTreeMap<AttackType, usize>,
}

/// A population of sensors indexed by node id.
#[derive(Debug, Clone)]
pub struct SensorNetwork {
    sensors: Vec<Sensor>,
    honest_ids: Vec<NodeId>,
    byzantine_ids: Vec<NodeId>,
}

impl SensorNetwork {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Whether the population is empty.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Honest node ids in increasing order.
    pub fn honest_ids(&self) -> &[NodeId] {
        &self.honest_ids
    }

    /// Byzantine node ids in the order they were drawn.
    pub fn byzantine_ids(&self) -> &[NodeId] {
        &self.byzantine_ids
    }

    /// Sensor of `node`.
    pub fn get(&self, node: NodeId) -> Option<&Sensor> {
        self.sensors.get(node.index())
    }

    /// Mutable sensor of `node`.
    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut Sensor> {
        self.sensors.get_mut(node.index())
    }

    /// Role of `node`.
    pub fn role(&self, node: NodeId) -> Option<SensorRole> {
        self.get(node).map(Sensor::role)
    }

    /// Sensors in node id order.
    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter()
    }

    /// Mutable sensors in node id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Sensor> {
        self.sensors.iter_mut()
    }

    /// Reset every sensor.
    pub fn reset(&mut self) {
        self.sensors.iter_mut().for_each(Sensor::reset);
    }

    /// Composition counts.
    pub fn summary(&self) -> NetworkSummary {
        let mut attack_distribution = BTreeMap::new();
        for sensor in &self.sensors {
            if let Sensor::Byzantine(attack) = sensor {
                *attack_distribution.entry(attack.attack_type()).or_insert(0) += 1;
            }
        }

        let total_nodes = self.sensors.len();
        NetworkSummary {
            total_nodes,
            honest_nodes: self.honest_ids.len(),
            byzantine_nodes: self.byzantine_ids.len(),
            byzantine_fraction: if total_nodes > 0 {
                self.byzantine_ids.len() as f64 / total_nodes as f64
            } else {
                0.0
            },
            attack_distribution,
        }
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Builds sensor populations.
pub struct SensorFactory;

impl SensorFactory {
    /// Build a population from a [`PopulationConfig`].
    pub fn from_config(
        config: &PopulationConfig,
        ground_truth: Arc<GroundTruth>,
    ) -> Result<SensorNetwork, ConfigError> {
        Self::create_sensor_network(
            config.num_nodes,
            config.byzantine_fraction,
            ground_truth,
            config.noise_std,
            Some(&config.attack_mix),
            config.seed,
        )
    }

    /// Partition `num_nodes` nodes into honest and Byzantine sensors.
    ///
    /// `floor(byzantine_fraction * num_nodes)` ids are drawn uniformly without
    /// replacement; each of them, in draw order, then gets a strategy drawn
    /// from `attack_mix` (the default mix when `None`). Both draws use one
    /// random stream keyed by `seed`.
    pub fn create_sensor_network(
        num_nodes: usize,
        byzantine_fraction: f64,
        ground_truth: Arc<GroundTruth>,
        noise_std: f64,
        attack_mix: Option<&AttackMix>,
        seed: u64,
    ) -> Result<SensorNetwork, ConfigError> {
        if num_nodes == 0 {
            return Err(ConfigError::out_of_range("num_nodes", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&byzantine_fraction) {
            return Err(ConfigError::out_of_range(
                "byzantine_fraction",
                format!("must be in [0, 1], got {}", byzantine_fraction),
            ));
        }
        let mix = attack_mix.cloned().unwrap_or_default();
        let distribution = mix.distribution()?;

        let mut rng = seeded_rng(seed, 0);
        let num_byzantine = (byzantine_fraction * num_nodes as f64) as usize;
        let byzantine_ids: Vec<NodeId> = index::sample(&mut rng, num_nodes, num_byzantine)
            .into_iter()
            .map(NodeId)
            .collect();

        let mut sensors = BTreeMap::new();
        for &node in &byzantine_ids {
            let attack_type = mix.weights()[distribution.sample(&mut rng)].0;
            let attack = ByzantineAttack::with_defaults(attack_type, node, ground_truth.clone(), seed)?;
            debug!("Factory: node {} is Byzantine ({})", node, attack_type);
            sensors.insert(node, Sensor::Byzantine(attack));
        }

        let mut honest_ids = Vec::with_capacity(num_nodes - num_byzantine);
        for node in (0..num_nodes).map(NodeId) {
            if sensors.contains_key(&node) {
                continue;
            }
            let sensor = HonestSensor::new(node, ground_truth.clone(), noise_std, seed)?;
            sensors.insert(node, Sensor::Honest(sensor));
            honest_ids.push(node);
        }

        let network = SensorNetwork {
            sensors: sensors.into_values().collect(),
            honest_ids,
            byzantine_ids,
        };
        info!(
            "Factory: {} nodes, {} honest, {} Byzantine {:?}",
            network.len(),
            network.honest_ids.len(),
            network.byzantine_ids.len(),
            network.summary().attack_distribution
        );
        Ok(network)
    }
}
