//! # bzsim-lora
//!
//! LoRa radio model for the bzsim testbed.
//!
//! This crate provides:
//! - Radio parameter configuration ([`RadioParams`], [`RadioConfig`])
//! - PHY calculations ([`RadioConfig::compute_airtime`], [`RadioConfig::required_snr`])
//! - Duty-cycle gated, pure-ALOHA network simulation ([`NetworkSimulator`])

pub mod network;

pub use network::{
    metric_defs, DeliveryReport, NetworkSimulator, NetworkStatistics, NodeStatistics,
    TransmitWindow, DEFAULT_PAYLOAD_BYTES,
};

use bzsim_common::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Radio Parameters
// ============================================================================

/// Bandwidths accepted by [`RadioConfig`], in Hz.
pub const VALID_BANDWIDTHS_HZ: [u32; 3] = [125_000, 250_000, 500_000];

/// Required SNR for spreading factors 7-12, indexed as [SF-7].
pub const SNR_THRESHOLDS_DB: [f64; 6] = [-7.5, -10.0, -12.5, -15.0, -17.5, -20.0];

/// Maximum transmit power accepted, in dBm.
pub const MAX_TX_POWER_DBM: i8 = 30;

/// Raw LoRa radio parameters, as supplied by a configuration layer.
///
/// This is an unvalidated bag of values; turn it into a [`RadioConfig`] with
/// [`RadioConfig::new`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioParams {
    /// Spreading factor (7-12).
    pub spreading_factor: u8,
    /// Bandwidth in Hz.
    pub bandwidth_hz: u32,
    /// Coding rate code (1-4, representing 4/5 to 4/8).
    pub coding_rate: u8,
    /// Transmit power in dBm.
    pub tx_power_dbm: i8,
    /// Duty cycle fraction in (0, 1].
    pub duty_cycle: f64,
    /// Number of preamble symbols.
    pub preamble_symbols: u32,
    /// Explicit header mode.
    pub explicit_header: bool,
    /// CRC enabled.
    pub crc_enabled: bool,
    /// Low data rate optimization. Forced on for SF11/SF12 at 125 kHz.
    pub low_data_rate_optimize: bool,
}

impl Default for RadioParams {
    fn default() -> Self {
        RadioParams {
            spreading_factor: 9,
            bandwidth_hz: 125_000,
            coding_rate: 1,
            tx_power_dbm: 14,
            duty_cycle: 0.01,
            preamble_symbols: 8,
            explicit_header: true,
            crc_enabled: true,
            low_data_rate_optimize: false,
        }
    }
}

/// Validated, immutable LoRa radio configuration.
///
/// Airtime and required SNR are pure functions of this struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RadioParams", into = "RadioParams")]
pub struct RadioConfig {
    params: RadioParams,
}

impl RadioConfig {
    /// Validate `params` and build a configuration.
    pub fn new(mut params: RadioParams) -> Result<Self, ConfigError> {
        if params.spreading_factor >= 11 && params.bandwidth_hz == 125_000 {
            params.low_data_rate_optimize = true;
        }

        if !(7..=12).contains(&params.spreading_factor) {
            return Err(ConfigError::out_of_range(
                "spreading_factor",
                format!("must be 7-12, got {}", params.spreading_factor),
            ));
        }
        if !VALID_BANDWIDTHS_HZ.contains(&params.bandwidth_hz) {
            return Err(ConfigError::out_of_range(
                "bandwidth_hz",
                format!("must be one of {:?}, got {}", VALID_BANDWIDTHS_HZ, params.bandwidth_hz),
            ));
        }
        if !(1..=4).contains(&params.coding_rate) {
            return Err(ConfigError::out_of_range(
                "coding_rate",
                format!("must be 1-4, got {}", params.coding_rate),
            ));
        }
        if !(params.duty_cycle > 0.0 && params.duty_cycle <= 1.0) {
            return Err(ConfigError::out_of_range(
                "duty_cycle",
                format!("must be in (0, 1], got {}", params.duty_cycle),
            ));
        }
        if !(0..=MAX_TX_POWER_DBM).contains(&params.tx_power_dbm) {
            return Err(ConfigError::out_of_range(
                "tx_power_dbm",
                format!("must be 0-{}, got {}", MAX_TX_POWER_DBM, params.tx_power_dbm),
            ));
        }

        Ok(RadioConfig { params })
    }

    /// The validated parameters.
    pub fn params(&self) -> &RadioParams {
        &self.params
    }

    /// Spreading factor (7-12).
    pub fn spreading_factor(&self) -> u8 {
        self.params.spreading_factor
    }

    /// Bandwidth in Hz.
    pub fn bandwidth_hz(&self) -> u32 {
        self.params.bandwidth_hz
    }

    /// Coding rate code (1-4).
    pub fn coding_rate(&self) -> u8 {
        self.params.coding_rate
    }

    /// Transmit power in dBm.
    pub fn tx_power_dbm(&self) -> i8 {
        self.params.tx_power_dbm
    }

    /// Duty cycle fraction.
    pub fn duty_cycle(&self) -> f64 {
        self.params.duty_cycle
    }

    /// Whether low data rate optimization is active.
    pub fn low_data_rate_optimize(&self) -> bool {
        self.params.low_data_rate_optimize
    }

    /// Coding rate as a fraction label, e.g. "4/5".
    pub fn coding_rate_label(&self) -> String {
        format!("4/{}", 4 + self.params.coding_rate)
    }

    /// Symbol duration in seconds.
    pub fn symbol_time(&self) -> f64 {
        2.0_f64.powi(self.params.spreading_factor as i32) / self.params.bandwidth_hz as f64
    }

    /// Required SNR in dB for successful reception at this spreading factor.
    pub fn required_snr(&self) -> f64 {
        SNR_THRESHOLDS_DB[(self.params.spreading_factor - 7) as usize]
    }

    /// Packet airtime in seconds (Semtech AN1200.13).
    ///
    /// `payload_bytes` is MAC header plus application payload.
    pub fn compute_airtime(&self, payload_bytes: usize) -> f64 {
        let sf = self.params.spreading_factor as i64;
        let cr = self.params.coding_rate as i64;
        let h = if self.params.explicit_header { 0 } else { 1 };
        let de = if self.params.low_data_rate_optimize { 1 } else { 0 };
        let crc = if self.params.crc_enabled { 1 } else { 0 };

        let t_sym = self.symbol_time();
        let t_preamble = (self.params.preamble_symbols as f64 + 4.25) * t_sym;

        let numerator = 8 * payload_bytes as i64 - 4 * sf + 28 + 16 * crc - 20 * h;
        let denominator = 4 * (sf - 2 * de);
        // Integer division truncates toward zero.
        let n_payload = 8 + (numerator / denominator * (cr + 4)).max(0);

        t_preamble + n_payload as f64 * t_sym
    }
}

impl TryFrom<RadioParams> for RadioConfig {
    type Error = ConfigError;

    fn try_from(params: RadioParams) -> Result<Self, Self::Error> {
        RadioConfig::new(params)
    }
}

impl From<RadioConfig> for RadioParams {
    fn from(config: RadioConfig) -> Self {
        config.params
    }
}

impl fmt::Display for RadioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RadioConfig(SF={}, BW={}kHz, CR={}, TxPower={}dBm, DutyCycle={:.1}%)",
            self.params.spreading_factor,
            self.params.bandwidth_hz / 1000,
            self.coding_rate_label(),
            self.params.tx_power_dbm,
            self.params.duty_cycle * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_sf(sf: u8) -> RadioConfig {
        RadioConfig::new(RadioParams {
            spreading_factor: sf,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_config_wraps_default_params() {
        let config = RadioConfig::default();
        assert_eq!(config.params(), &RadioParams::default());
        assert_eq!(RadioConfig::new(RadioParams::default()).unwrap(), config);
    }

    #[test]
    fn test_airtime_sf9_matches_semtech_calculator() {
        let config = RadioConfig::default();
        let airtime = config.compute_airtime(51);
        // SF9 / 125 kHz / CR 4/5 / 51 bytes: 12.25 + 63 symbols of 4.096 ms
        assert!((0.300..=0.320).contains(&airtime), "airtime {} out of range", airtime);
        assert!((airtime - 0.308224).abs() < 1e-9);
    }

    #[test]
    fn test_airtime_monotonic_in_spreading_factor() {
        let airtimes: Vec<f64> = (7..=12).map(|sf| config_with_sf(sf).compute_airtime(51)).collect();
        for pair in airtimes.windows(2) {
            assert!(pair[1] > pair[0], "airtime not increasing: {:?}", airtimes);
        }
    }

    #[test]
    fn test_low_data_rate_optimize_auto_enabled() {
        assert!(config_with_sf(11).low_data_rate_optimize());
        assert!(config_with_sf(12).low_data_rate_optimize());
        assert!(!config_with_sf(10).low_data_rate_optimize());

        let wide = RadioConfig::new(RadioParams {
            spreading_factor: 12,
            bandwidth_hz: 250_000,
            ..Default::default()
        })
        .unwrap();
        assert!(!wide.low_data_rate_optimize());
    }

    #[test]
    fn test_small_payload_clamps_payload_symbols() {
        let config = RadioConfig::new(RadioParams {
            spreading_factor: 12,
            crc_enabled: false,
            ..Default::default()
        })
        .unwrap();
        // Zero-byte payload truncates the payload term to zero; only the 8 fixed symbols remain.
        let expected = (8.0 + 4.25 + 8.0) * config.symbol_time();
        assert!((config.compute_airtime(0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_required_snr_table() {
        assert_eq!(config_with_sf(7).required_snr(), -7.5);
        assert_eq!(config_with_sf(9).required_snr(), -12.5);
        assert_eq!(config_with_sf(12).required_snr(), -20.0);
        assert!(config_with_sf(7).required_snr() > config_with_sf(12).required_snr());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let cases = [
            RadioParams { spreading_factor: 6, ..Default::default() },
            RadioParams { spreading_factor: 13, ..Default::default() },
            RadioParams { bandwidth_hz: 62_500, ..Default::default() },
            RadioParams { coding_rate: 0, ..Default::default() },
            RadioParams { coding_rate: 5, ..Default::default() },
            RadioParams { duty_cycle: 0.0, ..Default::default() },
            RadioParams { duty_cycle: 1.5, ..Default::default() },
            RadioParams { duty_cycle: f64::NAN, ..Default::default() },
            RadioParams { tx_power_dbm: -1, ..Default::default() },
            RadioParams { tx_power_dbm: 31, ..Default::default() },
        ];
        for params in cases {
            let result = RadioConfig::new(params.clone());
            assert!(
                matches!(result, Err(ConfigError::OutOfRange { .. })),
                "expected rejection for {:?}",
                params
            );
        }
        assert!(RadioConfig::new(RadioParams { duty_cycle: 1.0, ..Default::default() }).is_ok());
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let ok: RadioConfig =
            serde_json::from_str(r#"{"spreading_factor": 11, "duty_cycle": 0.1}"#).unwrap();
        assert_eq!(ok.spreading_factor(), 11);
        assert!(ok.low_data_rate_optimize());
        assert_eq!(ok.bandwidth_hz(), 125_000);

        let bad = serde_json::from_str::<RadioConfig>(r#"{"spreading_factor": 5}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_display() {
        let text = RadioConfig::default().to_string();
        assert_eq!(
            text,
            "RadioConfig(SF=9, BW=125kHz, CR=4/5, TxPower=14dBm, DutyCycle=1.0%)"
        );
    }
}
