//! Global HSV means and the continuous ripeness score.

use serde::{Deserialize, Serialize};

use crate::hsv::Hsv;
use crate::types::{Breakdown, Feature, RipenessError};

/// Arithmetic means over every pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalMeans {
    /// Mean hue in degrees.
    pub hue: f64,
    /// Mean saturation.
    pub saturation: f64,
    /// Mean value.
    pub value: f64,
}

impl GlobalMeans {
    /// The means as a breakdown of independent statistics.
    #[must_use]
    pub fn to_breakdown(self) -> Breakdown {
        [
            (Feature::HueMean, self.hue),
            (Feature::SaturationMean, self.saturation),
            (Feature::BrightnessMean, self.value),
        ]
        .into_iter()
        .collect()
    }
}

/// Weights of the ripeness score.
///
/// `score = hue * (1 - |hue_mean| / 180) + saturation * sat_mean + value * value_mean`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl ScoreWeights {
    /// Check every weight is finite.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] for a non-finite weight.
    pub fn validate(&self) -> Result<(), RipenessError> {
        if [self.hue, self.saturation, self.value]
            .iter()
            .all(|w| w.is_finite())
        {
            Ok(())
        } else {
            Err(RipenessError::InvalidConfig(format!(
                "score_weights must be finite, got {self:?}"
            )))
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            hue: 0.5,
            saturation: 0.3,
            value: 0.2,
        }
    }
}

/// Mean hue, saturation and value over `pixels`, or `None` when empty.
#[must_use]
pub fn global_means(pixels: &[Hsv]) -> Option<GlobalMeans> {
    if pixels.is_empty() {
        return None;
    }
    let (hue, saturation, value) = pixels.iter().fold((0.0, 0.0, 0.0), |(h, s, v), p| {
        (h + p.hue, s + p.saturation, v + p.value)
    });
    #[allow(clippy::cast_precision_loss)]
    let n = pixels.len() as f64;
    Some(GlobalMeans {
        hue: hue / n,
        saturation: saturation / n,
        value: value / n,
    })
}

/// Weighted ripeness score. Not clipped: hue means above 180 degrees
/// drive the hue term negative.
#[must_use]
pub fn ripeness_score(means: &GlobalMeans, weights: &ScoreWeights) -> f64 {
    weights.value.mul_add(
        means.value,
        weights.hue.mul_add(
            1.0 - means.hue.abs() / 180.0,
            weights.saturation * means.saturation,
        ),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const fn hsv(hue: f64, saturation: f64, value: f64) -> Hsv {
        Hsv {
            hue,
            saturation,
            value,
        }
    }

    #[test]
    fn empty_population_is_none() {
        assert!(global_means(&[]).is_none());
    }

    #[test]
    fn means_are_arithmetic() {
        let m = global_means(&[hsv(0.0, 1.0, 0.2), hsv(120.0, 0.5, 0.6)]).unwrap();
        assert!((m.hue - 60.0).abs() < 1e-12);
        assert!((m.saturation - 0.75).abs() < 1e-12);
        assert!((m.value - 0.4).abs() < 1e-12);
    }

    #[test]
    fn pure_red_scores_one() {
        let m = GlobalMeans {
            hue: 0.0,
            saturation: 1.0,
            value: 1.0,
        };
        assert!((ripeness_score(&m, &ScoreWeights::default()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn score_can_go_negative_for_blue_hues() {
        let m = GlobalMeans {
            hue: 350.0,
            saturation: 0.0,
            value: 0.0,
        };
        assert!(ripeness_score(&m, &ScoreWeights::default()) < 0.0);
    }

    #[test]
    fn breakdown_has_three_named_means() {
        let b = GlobalMeans {
            hue: 30.0,
            saturation: 0.4,
            value: 0.7,
        }
        .to_breakdown();
        assert_eq!(b.len(), 3);
        assert_eq!(b.get(Feature::HueMean), Some(30.0));
        assert_eq!(b.get(Feature::BrightnessMean), Some(0.7));
    }

    #[test]
    fn validate_rejects_nan_weight() {
        let w = ScoreWeights {
            hue: f64::NAN,
            ..ScoreWeights::default()
        };
        assert!(w.validate().is_err());
    }
}
