//! Threshold rules mapping aggregated features to a ripeness label.
//!
//! One rule set per aggregator family. Every entry point takes an
//! `Option` and maps `None` (empty population) to
//! [`Ripeness::NotDetected`] before any threshold is looked at.

use serde::{Deserialize, Serialize};

use crate::types::{Breakdown, ColorCategory, Feature, Ripeness, RipenessError};

/// Decision policy for hue-band histograms.
///
/// The two policies disagree on ambiguous inputs (Green 0.4 with
/// Red+Orange 0.5 is Ripe by dominance and Half-ripe by threshold), so
/// each histogram strategy is configured with exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistogramRule {
    /// The highest-weight band decides: Green is Unripe, Red or Orange is
    /// Ripe, anything else is Half-ripe. Ties go to the earlier band in
    /// [`ColorCategory::ALL`] order, so a histogram where every band is
    /// zero (only blue or purple pixels survived) reads as Green and
    /// therefore Unripe.
    #[default]
    Dominant,
    /// Absolute cut points from [`ProportionThresholds`].
    Threshold,
}

/// Absolute cut points on Green and Red+Orange proportions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProportionThresholds {
    /// Unripe when the Green weight is strictly above this.
    pub unripe_green_above: f64,
    /// Ripe when the Red+Orange weight is strictly above this.
    pub ripe_red_orange_above: f64,
}

impl ProportionThresholds {
    /// Cut points of [`HistogramRule::Threshold`].
    pub const HISTOGRAM: Self = Self {
        unripe_green_above: 0.45,
        ripe_red_orange_above: 0.55,
    };

    /// Cut points of the cluster rule set.
    pub const CLUSTERS: Self = Self {
        unripe_green_above: 0.5,
        ripe_red_orange_above: 0.6,
    };

    /// Green first, then Red+Orange, otherwise Half-ripe.
    #[must_use]
    pub fn decide(&self, breakdown: &Breakdown) -> Ripeness {
        let green = breakdown.color(ColorCategory::Green);
        let red_orange =
            breakdown.color(ColorCategory::Red) + breakdown.color(ColorCategory::Orange);
        if green > self.unripe_green_above {
            Ripeness::Unripe
        } else if red_orange > self.ripe_red_orange_above {
            Ripeness::Ripe
        } else {
            Ripeness::HalfRipe
        }
    }

    /// Check both cut points are finite.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] prefixed with `name`.
    pub fn validate(&self, name: &str) -> Result<(), RipenessError> {
        if self.unripe_green_above.is_finite() && self.ripe_red_orange_above.is_finite() {
            Ok(())
        } else {
            Err(RipenessError::InvalidConfig(format!(
                "{name} must be finite, got {self:?}"
            )))
        }
    }
}

/// Cut points on the continuous score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    /// Scores below this are Unripe.
    pub half_ripe_from: f64,
    /// Scores below this (and at least `half_ripe_from`) are Half-ripe;
    /// the rest are Ripe.
    pub ripe_from: f64,
}

impl ScoreThresholds {
    /// Check the cut points are finite and ordered.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] when they are not.
    pub fn validate(&self) -> Result<(), RipenessError> {
        if self.half_ripe_from.is_finite()
            && self.ripe_from.is_finite()
            && self.half_ripe_from <= self.ripe_from
        {
            Ok(())
        } else {
            Err(RipenessError::InvalidConfig(format!(
                "score_thresholds must be finite with half_ripe_from <= ripe_from, got {self:?}"
            )))
        }
    }
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            half_ripe_from: 0.35,
            ripe_from: 0.6,
        }
    }
}

/// Classify a hue-band histogram.
#[must_use]
pub fn classify_histogram(
    histogram: Option<&Breakdown>,
    rule: HistogramRule,
    thresholds: &ProportionThresholds,
) -> Ripeness {
    let Some(histogram) = histogram else {
        return Ripeness::NotDetected;
    };
    match rule {
        HistogramRule::Dominant => match histogram.dominant().map(|fw| fw.feature) {
            Some(Feature::Color(ColorCategory::Green)) => Ripeness::Unripe,
            Some(Feature::Color(ColorCategory::Red | ColorCategory::Orange)) => Ripeness::Ripe,
            _ => Ripeness::HalfRipe,
        },
        HistogramRule::Threshold => thresholds.decide(histogram),
    }
}

/// Classify a cluster bucket breakdown.
#[must_use]
pub fn classify_clusters(buckets: Option<&Breakdown>, thresholds: &ProportionThresholds) -> Ripeness {
    buckets.map_or(Ripeness::NotDetected, |b| thresholds.decide(b))
}

/// Classify a continuous ripeness score.
#[must_use]
pub fn classify_score(score: Option<f64>, thresholds: &ScoreThresholds) -> Ripeness {
    match score {
        None => Ripeness::NotDetected,
        Some(s) if s < thresholds.half_ripe_from => Ripeness::Unripe,
        Some(s) if s < thresholds.ripe_from => Ripeness::HalfRipe,
        Some(_) => Ripeness::Ripe,
    }
}
