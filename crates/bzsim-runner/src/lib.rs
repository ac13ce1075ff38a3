//! # bzsim-runner library
//!
//! Round-by-round testbed for Byzantine-resilient estimation over LoRa.
//!
//! A [`Testbed`] owns one sensor population and one network simulator over
//! the same node ids. Each call to [`Testbed::run_round`]:
//!
//! 1. asks every node, in id order, for a reading and confidence interval;
//! 2. offers each observation to the network, recording duty-cycle rejections;
//! 3. lets COLLIDER attackers decide whether to jam;
//! 4. advances the network clock and returns what was delivered.
//!
//! Acceptance and aggregation of the delivered intervals belong to the
//! consensus layer driving the testbed; it feeds its view of the honest
//! neighbourhood back in through [`NeighborhoodSummary`].

use bzsim_agents::{
    ByzantineBehavior, GroundTruth, NetworkSummary, PopulationConfig, Sensor, SensorFactory,
    SensorNetwork, SensorRole,
};
use bzsim_common::ConfigError;
use bzsim_interval::ConfidenceInterval;
use bzsim_lora::{
    DeliveryReport, NetworkSimulator, NetworkStatistics, RadioConfig, DEFAULT_PAYLOAD_BYTES,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub use bzsim_common::{NodeId, SimTime};

/// Offset of the network's collision stream from the population seed, clear
/// of the per-node sensor and attacker offsets.
pub const NETWORK_SEED_OFFSET: u64 = 1 << 32;

/// Metric names recorded by the testbed.
pub mod metric_defs {
    /// Rounds executed.
    pub const TESTBED_ROUNDS: &str = "bzsim_testbed_rounds";
    /// Observations produced by Byzantine nodes.
    pub const TESTBED_BYZANTINE_OBSERVATIONS: &str = "bzsim_testbed_byzantine_observations";
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while building or running a testbed.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Invalid parameter.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Configuration
// ============================================================================

/// Testbed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestbedConfig {
    /// Population composition and seed.
    pub population: PopulationConfig,
    /// Radio shared by every node.
    pub radio: RadioConfig,
    /// Application payload size used for airtime.
    pub payload_bytes: usize,
    /// Honest CI half-width as a multiple of the noise standard deviation.
    pub honest_width_multiplier: f64,
}

impl Default for TestbedConfig {
    fn default() -> Self {
        TestbedConfig {
            population: PopulationConfig::default(),
            radio: RadioConfig::default(),
            payload_bytes: DEFAULT_PAYLOAD_BYTES,
            honest_width_multiplier: 2.0,
        }
    }
}

impl TestbedConfig {
    /// Parse from JSON. Missing fields take their defaults; radio and attack
    /// mix are validated while parsing.
    pub fn from_json(text: &str) -> Result<Self, RunnerError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// Round Types
// ============================================================================

/// Honest-neighbourhood view supplied by the consensus layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodSummary {
    /// Estimate of the true value.
    pub estimate: f64,
    /// Representative honest interval.
    pub ci: ConfidenceInterval,
}

impl NeighborhoodSummary {
    /// Mean of `intervals`: average midpoint as the estimate, average bounds
    /// as the interval. `None` for an empty slice.
    pub fn from_intervals(intervals: &[ConfidenceInterval]) -> Option<Self> {
        if intervals.is_empty() {
            return None;
        }
        let n = intervals.len() as f64;
        let lower = intervals.iter().map(ConfidenceInterval::lower).sum::<f64>() / n;
        let upper = intervals.iter().map(ConfidenceInterval::upper).sum::<f64>() / n;
        let ci = ConfidenceInterval::new(lower, upper).ok()?;
        Some(NeighborhoodSummary {
            estimate: ci.midpoint(),
            ci,
        })
    }
}

/// One node's reading and interval for a round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Reporting node.
    pub node: NodeId,
    /// Role of the node (not visible to receivers in a real deployment).
    pub role: SensorRole,
    /// Reported value.
    pub reading: f64,
    /// Reported interval.
    pub ci: ConfidenceInterval,
}

/// Everything that happened in one round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    /// Zero-based round index.
    pub round: u64,
    /// Ground-truth time the readings were taken at.
    pub time: f64,
    /// Observations of every node, in node id order.
    pub observations: Vec<Observation>,
    /// Nodes whose transmission was rejected by the duty-cycle gate.
    pub blocked: Vec<NodeId>,
    /// COLLIDER nodes that jammed this round.
    pub jammers: Vec<NodeId>,
    /// Packets resolved while the clock advanced.
    pub deliveries: Vec<DeliveryReport<Observation>>,
}

impl RoundReport {
    /// Observations that reached at least one other node.
    pub fn delivered(&self) -> impl Iterator<Item = &Observation> {
        self.deliveries
            .iter()
            .filter(|d| d.delivered)
            .map(|d| &d.payload)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, RunnerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Combined testbed statistics.
#[derive(Debug, Clone, Serialize)]
pub struct TestbedStatistics {
    /// Rounds executed.
    pub rounds: u64,
    /// Population composition.
    pub population: NetworkSummary,
    /// Network counters.
    pub network: NetworkStatistics,
}

// ============================================================================
// Testbed
// ============================================================================

/// A sensor population attached to a network simulator.
pub struct Testbed {
    config: TestbedConfig,
    population: SensorNetwork,
    network: NetworkSimulator<Observation>,
    rounds: u64,
}

impl Testbed {
    /// Build the population and the network from `config`.
    pub fn new(config: TestbedConfig, ground_truth: Arc<GroundTruth>) -> Result<Self, RunnerError> {
        if !(config.honest_width_multiplier.is_finite() && config.honest_width_multiplier >= 0.0) {
            return Err(ConfigError::out_of_range(
                "honest_width_multiplier",
                format!("must be finite and >= 0, got {}", config.honest_width_multiplier),
            )
            .into());
        }

        let population = SensorFactory::from_config(&config.population, ground_truth)?;
        let network = NetworkSimulator::new(
            population.len(),
            config.radio.clone(),
            config.payload_bytes,
            config.population.seed.wrapping_add(NETWORK_SEED_OFFSET),
        )?;

        info!(
            "Testbed: {} nodes, {}, airtime {:.1} ms",
            population.len(),
            config.radio,
            network.airtime() * 1000.0
        );

        Ok(Testbed {
            config,
            population,
            network,
            rounds: 0,
        })
    }

    /// Configuration.
    pub fn config(&self) -> &TestbedConfig {
        &self.config
    }

    /// Sensor population.
    pub fn population(&self) -> &SensorNetwork {
        &self.population
    }

    /// Network simulator.
    pub fn network(&self) -> &NetworkSimulator<Observation> {
        &self.network
    }

    /// Mutable network simulator, e.g. to drain inboxes.
    pub fn network_mut(&mut self) -> &mut NetworkSimulator<Observation> {
        &mut self.network
    }

    /// Rounds executed so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Current network time.
    pub fn current_time(&self) -> SimTime {
        self.network.current_time()
    }

    /// Run one round with readings taken at ground-truth `time`, then advance
    /// the network by `round_duration`.
    pub fn run_round(
        &mut self,
        time: f64,
        neighborhood: Option<&NeighborhoodSummary>,
        round_duration: SimTime,
    ) -> Result<RoundReport, RunnerError> {
        let observations = self.observe(time, neighborhood)?;

        let mut blocked = Vec::new();
        for observation in &observations {
            if !self.network.transmit(observation.node, observation.clone()) {
                blocked.push(observation.node);
            }
        }

        let mut jammers = Vec::new();
        for sensor in self.population.iter_mut() {
            if let Sensor::Byzantine(attack) = sensor {
                if attack.should_jam() && self.network.inject_jamming(attack.node()) {
                    jammers.push(attack.node());
                }
            }
        }

        let deliveries = self.network.advance_by(round_duration);

        let report = RoundReport {
            round: self.rounds,
            time,
            observations,
            blocked,
            jammers,
            deliveries,
        };
        self.rounds += 1;

        metrics::counter!(metric_defs::TESTBED_ROUNDS).increment(1);
        debug!(
            "Testbed: round {} at t={}: {} blocked, {} jammers, {} resolved, {} delivered",
            report.round,
            time,
            report.blocked.len(),
            report.jammers.len(),
            report.deliveries.len(),
            report.delivered().count()
        );
        Ok(report)
    }

    fn observe(
        &mut self,
        time: f64,
        neighborhood: Option<&NeighborhoodSummary>,
    ) -> Result<Vec<Observation>, RunnerError> {
        let estimate = neighborhood.map(|n| n.estimate);
        let neighborhood_ci = neighborhood.map(|n| &n.ci);
        let neighborhood_width = neighborhood.map(|n| n.ci.width());

        let mut observations = Vec::with_capacity(self.population.len());
        for sensor in self.population.iter_mut() {
            let role = sensor.role();
            let (node, reading, ci) = match sensor {
                Sensor::Honest(honest) => {
                    let reading = honest.read(time);
                    let ci =
                        honest.get_confidence_interval(reading, self.config.honest_width_multiplier)?;
                    (honest.node(), reading, ci)
                }
                Sensor::Byzantine(attack) => {
                    let reading = attack.generate_reading(time, estimate, neighborhood_ci);
                    let ci = attack.generate_confidence_interval(reading, neighborhood_width)?;
                    metrics::counter!(metric_defs::TESTBED_BYZANTINE_OBSERVATIONS).increment(1);
                    (attack.node(), reading, ci)
                }
            };
            observations.push(Observation {
                node,
                role,
                reading,
                ci,
            });
        }
        Ok(observations)
    }

    /// Counters of the population and the network.
    pub fn statistics(&self) -> TestbedStatistics {
        TestbedStatistics {
            rounds: self.rounds,
            population: self.population.summary(),
            network: self.network.get_statistics(),
        }
    }

    /// Reset sensors, network and round counter. Roles are kept.
    pub fn reset(&mut self) {
        self.population.reset();
        self.network.reset();
        self.rounds = 0;
    }
}
