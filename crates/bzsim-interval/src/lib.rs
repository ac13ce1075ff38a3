//! # bzsim-interval
//!
//! Interval arithmetic on confidence intervals.
//!
//! This crate provides:
//! - The validated [`ConfidenceInterval`] type
//! - Set operations ([`intersection`], [`union`]) and overlap scoring ([`iou`], [`iou_matrix`])
//! - Contraction toward a target ([`contract`]) and agreement checks ([`epsilon_agreement`])
//! - Empirical intervals from sample sets ([`from_samples`])
//! - Closed-form bias bounds for IoU filtering ([`bounds`])

pub mod bounds;

use bzsim_common::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Widths below this are treated as zero when scoring overlap.
pub const DEGENERATE_WIDTH: f64 = 1e-12;

// ============================================================================
// Confidence Interval
// ============================================================================

/// A closed interval `[lower, upper]` with finite bounds and `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct ConfidenceInterval {
    lower: f64,
    upper: f64,
}

impl ConfidenceInterval {
    /// Create an interval, rejecting inverted or non-finite bounds.
    pub fn new(lower: f64, upper: f64) -> Result<Self, ConfigError> {
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(ConfigError::InvalidInterval { lower, upper });
        }
        Ok(ConfidenceInterval { lower, upper })
    }

    /// Interval `[center - half_width, center + half_width]`.
    pub fn centered(center: f64, half_width: f64) -> Result<Self, ConfigError> {
        Self::new(center - half_width, center + half_width)
    }

    /// Zero-width interval at `value`.
    pub fn point(value: f64) -> Result<Self, ConfigError> {
        Self::new(value, value)
    }

    /// Lower bound.
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// Upper bound.
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Bounds as a `(lower, upper)` pair.
    pub fn bounds(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    /// Center of the interval.
    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    /// Full width.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Half of the width.
    pub fn half_width(&self) -> f64 {
        self.width() / 2.0
    }

    /// Whether `value` lies in the closed interval.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

impl TryFrom<(f64, f64)> for ConfidenceInterval {
    type Error = ConfigError;

    fn try_from((lower, upper): (f64, f64)) -> Result<Self, Self::Error> {
        ConfidenceInterval::new(lower, upper)
    }
}

impl From<ConfidenceInterval> for (f64, f64) {
    fn from(ci: ConfidenceInterval) -> Self {
        ci.bounds()
    }
}

impl fmt::Display for ConfidenceInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CI([{:.3}, {:.3}], mid={:.3}, w={:.3})",
            self.lower,
            self.upper,
            self.midpoint(),
            self.width()
        )
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Overlap of two intervals, `None` when they are disjoint.
///
/// Intervals that touch at a single point intersect in a zero-width interval.
pub fn intersection(a: &ConfidenceInterval, b: &ConfidenceInterval) -> Option<ConfidenceInterval> {
    let lower = a.lower.max(b.lower);
    let upper = a.upper.min(b.upper);
    if lower > upper {
        None
    } else {
        Some(ConfidenceInterval { lower, upper })
    }
}

/// Convex hull of two intervals (the smallest interval containing both).
pub fn union(a: &ConfidenceInterval, b: &ConfidenceInterval) -> ConfidenceInterval {
    ConfidenceInterval {
        lower: a.lower.min(b.lower),
        upper: a.upper.max(b.upper),
    }
}

/// Intersection-over-union of two intervals, in `[0, 1]`.
///
/// Disjoint intervals score 0. When the hull is degenerate, two point
/// intervals at the same place score 1.
pub fn iou(a: &ConfidenceInterval, b: &ConfidenceInterval) -> f64 {
    let Some(overlap) = intersection(a, b) else {
        return 0.0;
    };
    let hull = union(a, b);

    if hull.width() < DEGENERATE_WIDTH {
        return if a.width() < DEGENERATE_WIDTH && b.width() < DEGENERATE_WIDTH {
            1.0
        } else {
            0.0
        };
    }

    (overlap.width() / hull.width()).clamp(0.0, 1.0)
}

/// Pairwise IoU of `intervals`, `m[i][j] = iou(intervals[i], intervals[j])`.
pub fn iou_matrix(intervals: &[ConfidenceInterval]) -> Vec<Vec<f64>> {
    intervals
        .iter()
        .map(|a| intervals.iter().map(|b| iou(a, b)).collect())
        .collect()
}

/// Shrink `ci` by `lambda` around `target` (the midpoint when `None`).
///
/// The half-width becomes `half_width * (1 - lambda)`: `lambda = 0` keeps the
/// width, `lambda = 1` collapses to a point.
pub fn contract(
    ci: &ConfidenceInterval,
    lambda: f64,
    target: Option<f64>,
) -> Result<ConfidenceInterval, ConfigError> {
    if !(0.0..=1.0).contains(&lambda) {
        return Err(ConfigError::InvalidContraction(lambda));
    }
    let center = target.unwrap_or_else(|| ci.midpoint());
    let half_width = ci.half_width() * (1.0 - lambda);
    ConfidenceInterval::centered(center, half_width)
}

/// Whether all midpoints lie within `epsilon` of each other.
///
/// Only the midpoint spread is checked; widths are not constrained. An empty
/// list is in agreement.
pub fn epsilon_agreement(intervals: &[ConfidenceInterval], epsilon: f64) -> bool {
    let mut midpoints = intervals.iter().map(ConfidenceInterval::midpoint);
    let Some(first) = midpoints.next() else {
        return true;
    };
    let (min, max) = midpoints.fold((first, first), |(lo, hi), m| (lo.min(m), hi.max(m)));
    max - min <= epsilon
}

/// Empirical interval covering the central `confidence` mass of `samples`.
///
/// Bounds are the `(1 - confidence) / 2` and `(1 + confidence) / 2` quantiles
/// with linear interpolation between order statistics.
pub fn from_samples(samples: &[f64], confidence: f64) -> Result<ConfidenceInterval, ConfigError> {
    if samples.is_empty() {
        return Err(ConfigError::InvalidSamples("no samples".into()));
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(ConfigError::InvalidSamples("non-finite sample".into()));
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(ConfigError::InvalidSamples(format!(
            "confidence must be in (0, 1), got {}",
            confidence
        )));
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let alpha = (1.0 - confidence) / 2.0;
    ConfidenceInterval::new(quantile(&sorted, alpha), quantile(&sorted, 1.0 - alpha))
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
