//! # bzsim-common
//!
//! Common types shared by the bzsim crates.
//!
//! This crate provides:
//! - Configuration errors ([`ConfigError`])
//! - Time representation ([`SimTime`])
//! - Node identification ([`NodeId`])
//! - Deterministic per-entity random streams ([`seeded_rng`])

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Construction-time configuration errors.
///
/// Every smart constructor in the workspace returns this error when a
/// parameter is out of range. Run-time network outcomes (blocked or collided
/// transmissions) are plain values and never use this type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Interval with lower bound above upper bound, or a non-finite bound.
    #[error("Invalid interval: [{lower}, {upper}]")]
    InvalidInterval {
        /// Lower bound.
        lower: f64,
        /// Upper bound.
        upper: f64,
    },

    /// Contraction factor outside [0, 1].
    #[error("Contraction factor must be in [0, 1], got {0}")]
    InvalidContraction(f64),

    /// Attack name that does not match any known strategy.
    #[error("Unknown attack type: {0}")]
    UnknownAttackType(String),

    /// Attack mix weights do not sum to 1.0.
    #[error("Attack mix must sum to 1.0, got {0}")]
    AttackMixSum(f64),

    /// A single named parameter is outside its valid range.
    #[error("Parameter '{name}' out of range: {message}")]
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Human readable description of the violated bound.
        message: String,
    },

    /// Ground truth definition is unusable.
    #[error("Invalid ground truth: {0}")]
    InvalidGroundTruth(String),

    /// Sample set cannot produce an interval.
    #[error("Invalid sample set: {0}")]
    InvalidSamples(String),
}

impl ConfigError {
    /// Build an [`ConfigError::OutOfRange`] error.
    pub fn out_of_range(name: &'static str, message: impl Into<String>) -> Self {
        ConfigError::OutOfRange {
            name,
            message: message.into(),
        }
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// Simulation time in microseconds since simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Zero time.
    pub const ZERO: SimTime = SimTime(0);

    /// Create from microseconds.
    pub fn from_micros(us: u64) -> Self {
        SimTime(us)
    }

    /// Create from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        SimTime(ms * 1000)
    }

    /// Create from seconds (float), rounded to the nearest microsecond.
    ///
    /// Negative and NaN inputs clamp to zero.
    pub fn from_secs(s: f64) -> Self {
        let us = (s * 1_000_000.0).round();
        if us.is_nan() || us <= 0.0 {
            SimTime::ZERO
        } else {
            SimTime(us as u64)
        }
    }

    /// Get as microseconds.
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get as milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0 / 1000
    }

    /// Get as seconds (float).
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Add duration to time.
    pub fn checked_add(&self, duration: SimTime) -> Option<SimTime> {
        self.0.checked_add(duration.0).map(SimTime)
    }

    /// Subtract duration from time.
    pub fn checked_sub(&self, duration: SimTime) -> Option<SimTime> {
        self.0.checked_sub(duration.0).map(SimTime)
    }
}

impl std::ops::Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Self) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for SimTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Self) -> Self::Output {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

// ============================================================================
// Node Types
// ============================================================================

/// Index of a node in a simulated population.
///
/// Node ids are dense: a population of `n` nodes uses ids `0..n`, which is
/// what lets the network simulator keep per-node state in plain vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Create a new node ID.
    pub fn new(id: usize) -> Self {
        NodeId(id)
    }

    /// Position of this node in per-node tables.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for NodeId {
    fn from(id: usize) -> Self {
        NodeId(id)
    }
}

// ============================================================================
// Randomness
// ============================================================================

/// Create an independent random stream for one entity.
///
/// The stream is keyed by `seed + offset` so that every node gets its own
/// reproducible sequence and no generator is ever shared between entities.
pub fn seeded_rng(seed: u64, offset: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.wrapping_add(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_sim_time_conversions() {
        let time = SimTime::from_secs(1.5);
        assert_eq!(time.as_millis(), 1500);
        assert_eq!(time.as_micros(), 1_500_000);
        assert!((time.as_secs_f64() - 1.5).abs() < 0.0001);
    }

    #[test]
    fn test_sim_time_from_secs_rounds_and_clamps() {
        assert_eq!(SimTime::from_secs(0.0000014).as_micros(), 1);
        assert_eq!(SimTime::from_secs(-3.0), SimTime::ZERO);
        assert_eq!(SimTime::from_secs(f64::NAN), SimTime::ZERO);
    }

    #[test]
    fn test_sim_time_arithmetic() {
        let t1 = SimTime::from_millis(100);
        let t2 = SimTime::from_millis(50);
        assert_eq!((t1 + t2).as_millis(), 150);
        assert_eq!((t1 - t2).as_millis(), 50);
        assert_eq!((t2 - t1), SimTime::ZERO);
        assert_eq!(t2.checked_sub(t1), None);

        let mut t = SimTime::ZERO;
        t += SimTime::from_micros(7);
        assert_eq!(t.as_micros(), 7);
    }

    #[test]
    fn test_seeded_rng_streams_are_reproducible_and_distinct() {
        let a: Vec<u64> = (0..4).map({
            let mut rng = seeded_rng(42, 3);
            move |_| rng.gen()
        }).collect();
        let b: Vec<u64> = (0..4).map({
            let mut rng = seeded_rng(42, 3);
            move |_| rng.gen()
        }).collect();
        let c: Vec<u64> = (0..4).map({
            let mut rng = seeded_rng(42, 4);
            move |_| rng.gen()
        }).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::out_of_range("spreading_factor", "must be 7-12, got 6");
        assert_eq!(
            err.to_string(),
            "Parameter 'spreading_factor' out of range: must be 7-12, got 6"
        );
        assert_eq!(
            ConfigError::InvalidInterval { lower: 2.0, upper: 1.0 }.to_string(),
            "Invalid interval: [2, 1]"
        );
    }

    #[test]
    fn test_node_id_serde() {
        let id = NodeId::new(12);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "12");
        assert_eq!(serde_json::from_str::<NodeId>(&json).unwrap(), id);
    }
}
