//! Honest sensor: ground truth plus Gaussian noise.

use crate::GroundTruth;
use bzsim_common::{seeded_rng, ConfigError, NodeId};
use bzsim_interval::ConfidenceInterval;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::fmt;
use std::sync::Arc;

/// Default CI half-width as a multiple of the noise standard deviation (~95%).
pub const DEFAULT_WIDTH_MULTIPLIER: f64 = 2.0;

/// Default honest noise standard deviation.
pub const DEFAULT_NOISE_STD: f64 = 0.5;

/// A sensor that reports `truth(t) + N(0, sigma)`.
#[derive(Debug, Clone)]
pub struct HonestSensor {
    node: NodeId,
    ground_truth: Arc<GroundTruth>,
    noise_std: f64,
    noise: Normal<f64>,
    rng: ChaCha8Rng,
    num_readings: u64,
    last_reading: Option<f64>,
    last_time: Option<f64>,
}

impl HonestSensor {
    /// Create a sensor with its own random stream keyed by `seed + node`.
    pub fn new(
        node: NodeId,
        ground_truth: Arc<GroundTruth>,
        noise_std: f64,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if !noise_std.is_finite() || noise_std < 0.0 {
            return Err(ConfigError::out_of_range(
                "noise_std",
                format!("must be finite and >= 0, got {}", noise_std),
            ));
        }
        let noise = Normal::new(0.0, noise_std)
            .map_err(|e| ConfigError::out_of_range("noise_std", e.to_string()))?;

        Ok(HonestSensor {
            node,
            ground_truth,
            noise_std,
            noise,
            rng: seeded_rng(seed, node.index() as u64),
            num_readings: 0,
            last_reading: None,
            last_time: None,
        })
    }

    /// Node this sensor belongs to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Noise standard deviation.
    pub fn noise_std(&self) -> f64 {
        self.noise_std
    }

    /// Number of readings since construction or the last reset.
    pub fn num_readings(&self) -> u64 {
        self.num_readings
    }

    /// Most recent reading.
    pub fn last_reading(&self) -> Option<f64> {
        self.last_reading
    }

    /// Time of the most recent reading.
    pub fn last_time(&self) -> Option<f64> {
        self.last_time
    }

    /// Take a noisy measurement at `time`.
    pub fn read(&mut self, time: f64) -> f64 {
        let measurement = self.ground_truth.get_value(time) + self.noise.sample(&mut self.rng);
        self.num_readings += 1;
        self.last_reading = Some(measurement);
        self.last_time = Some(time);
        measurement
    }

    /// `measurement +- width_multiplier * sigma`.
    pub fn get_confidence_interval(
        &self,
        measurement: f64,
        width_multiplier: f64,
    ) -> Result<ConfidenceInterval, ConfigError> {
        ConfidenceInterval::centered(measurement, width_multiplier * self.noise_std)
    }

    /// Clear reading statistics. The random stream continues.
    pub fn reset(&mut self) {
        self.num_readings = 0;
        self.last_reading = None;
        self.last_time = None;
    }
}

impl fmt::Display for HonestSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HonestSensor(id={}, sigma={}, readings={})",
            self.node, self.noise_std, self.num_readings
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
    fn test_readings_are_noisy_around_truth() {
        let mut sensor = HonestSensor::new(NodeId(3), truth(), 0.5, 42).unwrap();
        let readings: Vec<f64> = (0..2000).map(|i| sensor.read(i as f64)).collect();
        let mean = readings.iter().sum::<f64>() / readings.len() as f64;
        let var = readings.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / readings.len() as f64;
        assert!((mean - 25.0).abs() < 0.1, "mean {}", mean);
        assert!((var.sqrt() - 0.5).abs() < 0.05, "std {}", var.sqrt());
        assert_eq!(sensor.num_readings(), 2000);
        assert_eq!(sensor.last_time(), Some(1999.0));
        assert_eq!(sensor.last_reading(), readings.last().copied());
    }

    #[test]
    fn test_zero_noise_reads_truth() {
        let mut sensor = HonestSensor::new(NodeId(0), truth(), 0.0, 1).unwrap();
        assert_eq!(sensor.read(10.0), 25.0);
        let ci = sensor.get_confidence_interval(25.0, 2.0).unwrap();
        assert_eq!(ci.width(), 0.0);
    }

    #[test]
    fn test_confidence_interval_width() {
        let sensor = HonestSensor::new(NodeId(0), truth(), 0.5, 1).unwrap();
        let ci = sensor.get_confidence_interval(24.0, DEFAULT_WIDTH_MULTIPLIER).unwrap();
        assert_eq!(ci.bounds(), (23.0, 25.0));
    }

    #[test]
    fn test_streams_keyed_by_node() {
        let a: Vec<f64> = {
            let mut s = HonestSensor::new(NodeId(1), truth(), 0.5, 42).unwrap();
            (0..5).map(|t| s.read(t as f64)).collect()
        };
        let b: Vec<f64> = {
            let mut s = HonestSensor::new(NodeId(1), truth(), 0.5, 42).unwrap();
            (0..5).map(|t| s.read(t as f64)).collect()
        };
        let c: Vec<f64> = {
            let mut s = HonestSensor::new(NodeId(2), truth(), 0.5, 42).unwrap();
            (0..5).map(|t| s.read(t as f64)).collect()
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_reset_clears_statistics() {
        let mut sensor = HonestSensor::new(NodeId(0), truth(), 0.5, 7).unwrap();
        sensor.read(1.0);
        sensor.reset();
        assert_eq!(sensor.num_readings(), 0);
        assert_eq!(sensor.last_reading(), None);
        assert_eq!(sensor.last_time(), None);
    }

    #[test]
    fn test_rejects_invalid_noise() {
        assert!(HonestSensor::new(NodeId(0), truth(), -0.1, 0).is_err());
        assert!(HonestSensor::new(NodeId(0), truth(), f64::NAN, 0).is_err());
    }
}
