//! Closed-form bias bounds for IoU-based Byzantine filtering.
//!
//! With `f < n/2` Byzantine nodes, honest CI half-width `W_h`, sub-Gaussian
//! sensor noise `sigma` and IoU acceptance threshold `tau`, the consensus
//! bias is bounded with probability `confidence` by
//!
//! ```text
//! |x_consensus - x_true| <= W_h (1 - tau) + sigma * sqrt(2 ln(2n / delta)),  delta = 1 - confidence
//! ```
//!
//! These are formulas only; no filtering is performed here.

use serde::Serialize;

/// Default probability level for the bounds.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Practical range for the suggested IoU threshold.
pub const TAU_RANGE: (f64, f64) = (0.15, 0.30);

/// Threshold returned when `W_h` is too small to reason about.
pub const FALLBACK_TAU: f64 = 0.5;

/// Bias bound split into its two sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasDecomposition {
    /// `W_h (1 - tau)`: shift an accepted adversarial CI can cause.
    pub adversarial_term: f64,
    /// `sigma * sqrt(2 ln(2n / delta))`: honest noise concentration.
    pub statistical_term: f64,
    /// Sum of both terms.
    pub total_bound: f64,
    /// Threshold that makes the adversarial term twice the statistical one,
    /// clipped to `[0, 1]`.
    pub optimal_tau_hint: f64,
}

/// Result of [`verify_assumptions`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssumptionReport {
    /// Whether every check passed.
    pub all_valid: bool,
    /// One line per check, prefixed `OK` or `FAIL`.
    pub checks: Vec<String>,
}

fn statistical_term(sigma: f64, n: usize, confidence: f64) -> f64 {
    let delta = 1.0 - confidence;
    sigma * (2.0 * (2.0 * n as f64 / delta).ln()).sqrt()
}

/// Upper bound on consensus bias, `W_h (1 - tau) + sigma * sqrt(2 ln(2n / delta))`.
pub fn theoretical_bias_bound(w_h: f64, tau: f64, sigma: f64, n: usize, confidence: f64) -> f64 {
    w_h * (1.0 - tau) + statistical_term(sigma, n, confidence)
}

/// Split the bound into adversarial and statistical terms.
pub fn decompose_bias_sources(
    w_h: f64,
    tau: f64,
    sigma: f64,
    n: usize,
    confidence: f64,
) -> BiasDecomposition {
    let adversarial_term = w_h * (1.0 - tau);
    let statistical_term = statistical_term(sigma, n, confidence);

    let optimal_tau_hint = if w_h > 0.0 {
        (1.0 - 2.0 * statistical_term / w_h).clamp(0.0, 1.0)
    } else {
        FALLBACK_TAU
    };

    BiasDecomposition {
        adversarial_term,
        statistical_term,
        total_bound: adversarial_term + statistical_term,
        optimal_tau_hint,
    }
}

/// Heuristic IoU threshold `0.67 - stat / W_h`, clipped to [`TAU_RANGE`].
///
/// Returns the threshold and a one-line explanation.
pub fn optimal_iou_threshold(w_h: f64, sigma: f64, n: usize, confidence: f64) -> (f64, String) {
    if w_h < 1e-6 {
        return (
            FALLBACK_TAU,
            format!("W_h too small, using default tau={}", FALLBACK_TAU),
        );
    }

    let stat = statistical_term(sigma, n, confidence);
    let tau = (0.67 - stat / w_h).clamp(TAU_RANGE.0, TAU_RANGE.1);
    let explanation = format!(
        "tau* ~ {:.3} balances Byzantine defense (1-tau={:.3}) vs honest acceptance. \
         Statistical noise contributes {:.3}, adversarial potential is {:.3}.",
        tau,
        1.0 - tau,
        stat,
        w_h * (1.0 - tau)
    );
    (tau, explanation)
}

/// Check the preconditions of the bias bound.
///
/// Checks Byzantine minority (`f < n/2`), positive noise, positive CI width
/// and `tau` in `[0, 1]`. Every check is reported, not just the first failure.
pub fn verify_assumptions(n: usize, f: usize, sigma: f64, w_h: f64, tau: f64) -> AssumptionReport {
    let half = n as f64 / 2.0;
    let results = [
        (
            (f as f64) < half,
            format!("Byzantine minority: f={} < n/2={}", f, half),
        ),
        (sigma > 0.0, format!("positive sensor noise: sigma={}", sigma)),
        (w_h > 0.0, format!("non-degenerate CIs: W_h={}", w_h)),
        (
            (0.0..=1.0).contains(&tau),
            format!("valid IoU threshold: tau={} in [0, 1]", tau),
        ),
    ];

    let all_valid = results.iter().all(|(ok, _)| *ok);
    let checks = results
        .into_iter()
        .map(|(ok, text)| format!("{} {}", if ok { "OK" } else { "FAIL" }, text))
        .collect();

    AssumptionReport { all_valid, checks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bias_bound_reference_scenario() {
        // n=100, W_h=2, sigma=0.5, tau=0.2: 1.6 + 0.5 * sqrt(2 ln 4000)
        let bound = theoretical_bias_bound(2.0, 0.2, 0.5, 100, DEFAULT_CONFIDENCE);
        let expected = 1.6 + 0.5 * (2.0 * 4000.0_f64.ln()).sqrt();
        assert!((bound - expected).abs() < 1e-9);
    }

    #[test]
    fn test_decomposition_sums_to_bound() {
        let d = decompose_bias_sources(2.0, 0.2, 0.5, 100, DEFAULT_CONFIDENCE);
        assert!((d.adversarial_term - 1.6).abs() < 1e-12);
        assert!((d.total_bound - d.adversarial_term - d.statistical_term).abs() < 1e-12);
        assert!(
            (d.total_bound - theoretical_bias_bound(2.0, 0.2, 0.5, 100, DEFAULT_CONFIDENCE)).abs()
                < 1e-12
        );
        // Statistical term ~2.04 exceeds W_h / 2, so the hint clips to zero.
        assert_eq!(d.optimal_tau_hint, 0.0);

        let wide = decompose_bias_sources(100.0, 0.2, 0.5, 100, DEFAULT_CONFIDENCE);
        assert!(wide.optimal_tau_hint > 0.9 && wide.optimal_tau_hint < 1.0);

        let degenerate = decompose_bias_sources(0.0, 0.2, 0.5, 100, DEFAULT_CONFIDENCE);
        assert_eq!(degenerate.optimal_tau_hint, FALLBACK_TAU);
    }

    #[test]
    fn test_optimal_threshold_is_clipped() {
        let (tau, text) = optimal_iou_threshold(2.0, 0.5, 100, DEFAULT_CONFIDENCE);
        assert_eq!(tau, 0.15);
        assert!(text.contains("0.150"));

        let (tau, _) = optimal_iou_threshold(1000.0, 0.01, 10, DEFAULT_CONFIDENCE);
        assert_eq!(tau, 0.30);

        let (tau, text) = optimal_iou_threshold(0.0, 0.5, 100, DEFAULT_CONFIDENCE);
        assert_eq!(tau, FALLBACK_TAU);
        assert!(text.contains("too small"));
    }

    #[test]
    fn test_verify_assumptions() {
        let ok = verify_assumptions(100, 10, 0.5, 2.0, 0.2);
        assert!(ok.all_valid);
        assert_eq!(ok.checks.len(), 4);
        assert!(ok.checks.iter().all(|c| c.starts_with("OK")));

        let bad = verify_assumptions(10, 5, 0.0, 2.0, 1.5);
        assert!(!bad.all_valid);
        let failures: Vec<_> = bad.checks.iter().filter(|c| c.starts_with("FAIL")).collect();
        assert_eq!(failures.len(), 3);
    }
}
