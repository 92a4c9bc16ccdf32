//! Classification strategies: converter, aggregator and rule set.
//!
//! This module defines the [`Strategy`] trait for pluggable
//! classification strategies and the [`StrategyKind`] enum for selecting
//! which one to run.
//!
//! # Strategy pattern
//!
//! Each strategy is a fixed triple. The converter maps normalized RGB
//! into the color space the aggregator needs, the aggregator reduces the
//! pixel population to a [`Breakdown`] (or a score), and the rule set
//! maps that to a [`Ripeness`]. An empty population is carried through as
//! `None` so every rule set answers [`Ripeness::NotDetected`] itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify;
use crate::cluster::{self, Cluster};
use crate::histogram;
use crate::hsv::{self, Hsv};
use crate::lab::{self, Lab};
use crate::mask;
use crate::stats::{self, GlobalMeans};
use crate::types::{
    Breakdown, Classification, ColorPlane, Dimensions, Pixels, Population, Ripeness,
    RipenessConfig, RipenessError,
};

/// Selects which classification strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    /// HSV, background mask, hue-band histogram of the survivors.
    #[default]
    MaskedHistogram,
    /// HSV, hue-band histogram of every pixel.
    Histogram,
    /// CIE L*a*b*, k-means dominant colors bucketed by [`cluster::LabRules`].
    LabClusters,
    /// HSV, global means combined into a weighted score.
    GlobalMean,
}

impl StrategyKind {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::MaskedHistogram,
        Self::Histogram,
        Self::LabClusters,
        Self::GlobalMean,
    ];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaskedHistogram => f.write_str("MaskedHistogram"),
            Self::Histogram => f.write_str("Histogram"),
            Self::LabClusters => f.write_str("LabClusters"),
            Self::GlobalMean => f.write_str("GlobalMean"),
        }
    }
}

/// Per-pixel color coordinates produced by a strategy's converter.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSamples {
    /// Hue/saturation/value.
    Hsv(ColorPlane<Hsv>),
    /// CIE L*a*b*.
    Lab(ColorPlane<Lab>),
}

impl ColorSamples {
    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        match self {
            Self::Hsv(plane) => plane.dimensions(),
            Self::Lab(plane) => plane.dimensions(),
        }
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Hsv(plane) => plane.len(),
            Self::Lab(plane) => plane.len(),
        }
    }

    /// Returns `true` if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the color space.
    #[must_use]
    pub const fn space(&self) -> &'static str {
        match self {
            Self::Hsv(_) => "HSV",
            Self::Lab(_) => "LAB",
        }
    }

    fn hsv(&self) -> Result<&[Hsv], RipenessError> {
        match self {
            Self::Hsv(plane) => Ok(plane.values()),
            Self::Lab(_) => Err(RipenessError::InvalidInput(
                "strategy expects HSV samples, got LAB".to_owned(),
            )),
        }
    }

    fn lab(&self) -> Result<&[Lab], RipenessError> {
        match self {
            Self::Lab(plane) => Ok(plane.values()),
            Self::Hsv(_) => Err(RipenessError::InvalidInput(
                "strategy expects LAB samples, got HSV".to_owned(),
            )),
        }
    }
}

/// Output of a strategy's aggregator.
///
/// The `Option` fields are `None` exactly when the population the
/// aggregator looked at was empty.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// Hue-band proportions (masked or unmasked).
    Histogram {
        histogram: Option<Breakdown>,
        population: Population,
    },
    /// Dominant LAB clusters and their per-bucket sums.
    Clusters {
        clusters: Option<Vec<Cluster>>,
        buckets: Option<Breakdown>,
        population: Population,
    },
    /// Global HSV means and the derived score.
    Means {
        means: Option<GlobalMeans>,
        score: Option<f64>,
        population: Population,
    },
}

impl Aggregate {
    /// Short name of the aggregate family.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Histogram { .. } => "histogram",
            Self::Clusters { .. } => "clusters",
            Self::Means { .. } => "means",
        }
    }

    /// Pixel counts the aggregator saw.
    #[must_use]
    pub const fn population(&self) -> Population {
        match self {
            Self::Histogram { population, .. }
            | Self::Clusters { population, .. }
            | Self::Means { population, .. } => *population,
        }
    }

    /// Returns `true` if no pixel entered the features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.population().considered == 0
    }

    /// The feature breakdown, `None` for an empty population.
    #[must_use]
    pub fn features(&self) -> Option<Breakdown> {
        match self {
            Self::Histogram { histogram, .. } => histogram.clone(),
            Self::Clusters { buckets, .. } => buckets.clone(),
            Self::Means { means, .. } => means.map(GlobalMeans::to_breakdown),
        }
    }

    /// The continuous score, only for the global-mean aggregate.
    #[must_use]
    pub const fn score(&self) -> Option<f64> {
        match self {
            Self::Means { score, .. } => *score,
            Self::Histogram { .. } | Self::Clusters { .. } => None,
        }
    }
}

/// Trait for classification strategies.
pub trait Strategy {
    /// Convert normalized RGB into the color space this strategy works in.
    fn convert(&self, pixels: &Pixels) -> ColorSamples;

    /// Reduce converted samples to features.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidInput`] if `samples` are in the
    /// wrong color space, or [`RipenessError::Clustering`] if k-means
    /// fails.
    fn aggregate(
        &self,
        samples: &ColorSamples,
        config: &RipenessConfig,
    ) -> Result<Aggregate, RipenessError>;

    /// Map features to a label with this strategy's rule set.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidInput`] if `aggregate` was not
    /// produced by this strategy.
    fn classify(
        &self,
        aggregate: &Aggregate,
        config: &RipenessConfig,
    ) -> Result<Ripeness, RipenessError>;
}

impl Strategy for StrategyKind {
    fn convert(&self, pixels: &Pixels) -> ColorSamples {
        match *self {
            Self::MaskedHistogram | Self::Histogram | Self::GlobalMean => {
                ColorSamples::Hsv(hsv::convert(pixels))
            }
            Self::LabClusters => ColorSamples::Lab(lab::convert(pixels)),
        }
    }

    fn aggregate(
        &self,
        samples: &ColorSamples,
        config: &RipenessConfig,
    ) -> Result<Aggregate, RipenessError> {
        let total = samples.len();
        let aggregate = match *self {
            Self::MaskedHistogram => {
                let kept = mask::apply_mask(samples.hsv()?, &config.mask);
                Aggregate::Histogram {
                    histogram: histogram::hue_histogram(&kept, &config.hue_bands),
                    population: Population {
                        total,
                        considered: kept.len(),
                    },
                }
            }
            Self::Histogram => Aggregate::Histogram {
                histogram: histogram::hue_histogram(samples.hsv()?, &config.hue_bands),
                population: Population {
                    total,
                    considered: total,
                },
            },
            Self::LabClusters => {
                let clusters = cluster::cluster_lab(samples.lab()?, &config.clustering)?;
                let buckets = clusters.as_deref().map(cluster::bucket_proportions);
                Aggregate::Clusters {
                    clusters,
                    buckets,
                    population: Population {
                        total,
                        considered: total,
                    },
                }
            }
            Self::GlobalMean => {
                let means = stats::global_means(samples.hsv()?);
                let score = means
                    .as_ref()
                    .map(|m| stats::ripeness_score(m, &config.score_weights));
                Aggregate::Means {
                    means,
                    score,
                    population: Population {
                        total,
                        considered: total,
                    },
                }
            }
        };
        if aggregate.is_empty() {
            tracing::debug!(strategy = %self, total, "empty population");
        }
        Ok(aggregate)
    }

    fn classify(
        &self,
        aggregate: &Aggregate,
        config: &RipenessConfig,
    ) -> Result<Ripeness, RipenessError> {
        let thresholds = &config.histogram_thresholds;
        match (*self, aggregate) {
            (Self::MaskedHistogram, Aggregate::Histogram { histogram, .. }) => Ok(
                classify::classify_histogram(histogram.as_ref(), config.masked_rule, thresholds),
            ),
            (Self::Histogram, Aggregate::Histogram { histogram, .. }) => Ok(
                classify::classify_histogram(histogram.as_ref(), config.unmasked_rule, thresholds),
            ),
            (Self::LabClusters, Aggregate::Clusters { buckets, .. }) => Ok(
                classify::classify_clusters(buckets.as_ref(), &config.cluster_thresholds),
            ),
            (Self::GlobalMean, Aggregate::Means { score, .. }) => Ok(classify::classify_score(
                *score,
                &config.score_thresholds,
            )),
            (strategy, other) => Err(RipenessError::InvalidInput(format!(
                "{strategy} cannot classify a {} aggregate",
                other.kind(),
            ))),
        }
    }
}

/// Run `strategy` end to end on already-normalized pixels.
///
/// Does not validate `config`; the public entry points do.
///
/// # Errors
///
/// Propagates [`Strategy::aggregate`] errors.
pub(crate) fn run(
    strategy: StrategyKind,
    pixels: &Pixels,
    config: &RipenessConfig,
) -> Result<Classification, RipenessError> {
    let samples = strategy.convert(pixels);
    let aggregate = strategy.aggregate(&samples, config)?;
    let label = strategy.classify(&aggregate, config)?;
    Ok(assemble(strategy, label, &aggregate, samples.dimensions()))
}

/// Build the public result from an aggregate and its label.
pub(crate) fn assemble(
    strategy: StrategyKind,
    label: Ripeness,
    aggregate: &Aggregate,
    dimensions: Dimensions,
) -> Classification {
    Classification {
        strategy,
        label,
        features: aggregate.features().unwrap_or_default(),
        score: aggregate.score(),
        population: aggregate.population(),
        dimensions,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::classify::HistogramRule;
    use crate::types::{ColorCategory, Feature};

    fn flat(width: u32, height: u32, rgb: [u8; 3]) -> Pixels {
        let data: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
        Pixels::from_raw(width, height, 3, &data).unwrap()
    }

    #[test]
    fn default_is_masked_histogram() {
        assert_eq!(StrategyKind::default(), StrategyKind::MaskedHistogram);
    }

    #[test]
    fn converter_matches_color_space() {
        let pixels = flat(2, 2, [10, 200, 10]);
        for kind in StrategyKind::ALL {
            let samples = kind.convert(&pixels);
            let expected = if kind == StrategyKind::LabClusters {
                "LAB"
            } else {
                "HSV"
            };
            assert_eq!(samples.space(), expected, "{kind}");
            assert_eq!(samples.len(), 4);
        }
    }

    #[test]
    fn wrong_color_space_is_rejected() {
        let pixels = flat(1, 1, [10, 200, 10]);
        let lab = StrategyKind::LabClusters.convert(&pixels);
        let result = StrategyKind::Histogram.aggregate(&lab, &RipenessConfig::default());
        assert!(matches!(result, Err(RipenessError::InvalidInput(_))));
    }

    #[test]
    fn masked_population_counts_survivors() {
        // One saturated green pixel, three gray ones.
        let pixels = Pixels::from_raw(
            2,
            2,
            3,
            &[20, 160, 20, 128, 128, 128, 128, 128, 128, 128, 128, 128],
        )
        .unwrap();
        let kind = StrategyKind::MaskedHistogram;
        let config = RipenessConfig::default();
        let agg = kind.aggregate(&kind.convert(&pixels), &config).unwrap();
        assert_eq!(
            agg.population(),
            Population {
                total: 4,
                considered: 1
            }
        );
        let features = agg.features().unwrap();
        assert!((features.color(ColorCategory::Green) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_population_yields_not_detected_with_empty_features() {
        let config = RipenessConfig::default();
        let result = run(StrategyKind::MaskedHistogram, &flat(3, 3, [0, 0, 0]), &config).unwrap();
        assert_eq!(result.label, Ripeness::NotDetected);
        assert!(result.features.is_empty());
        assert_eq!(result.population.considered, 0);
        assert_eq!(result.population.total, 9);
    }

    #[test]
    fn empty_image_is_not_detected_for_every_strategy() {
        let config = RipenessConfig::default();
        let empty = Pixels::from_raw(0, 0, 3, &[]).unwrap();
        for kind in StrategyKind::ALL {
            let result = run(kind, &empty, &config).unwrap();
            assert_eq!(result.label, Ripeness::NotDetected, "{kind}");
            assert_eq!(result.score, None);
        }
    }

    #[test]
    fn only_global_mean_reports_a_score() {
        let config = RipenessConfig::default();
        let pixels = flat(2, 2, [255, 0, 0]);
        for kind in StrategyKind::ALL {
            let result = run(kind, &pixels, &config).unwrap();
            assert_eq!(
                result.score.is_some(),
                kind == StrategyKind::GlobalMean,
                "{kind}"
            );
        }
    }

    #[test]
    fn each_histogram_strategy_uses_its_own_rule() {
        // Green 0.4, Red 0.5: Ripe by dominance, Half-ripe by threshold.
        let histogram: Breakdown = [
            (Feature::from(ColorCategory::Green), 0.4),
            (Feature::from(ColorCategory::Red), 0.5),
        ]
        .into_iter()
        .collect();
        let aggregate = Aggregate::Histogram {
            histogram: Some(histogram),
            population: Population {
                total: 10,
                considered: 10,
            },
        };
        let config = RipenessConfig {
            masked_rule: HistogramRule::Threshold,
            unmasked_rule: HistogramRule::Dominant,
            ..RipenessConfig::default()
        };
        assert_eq!(
            StrategyKind::MaskedHistogram
                .classify(&aggregate, &config)
                .unwrap(),
            Ripeness::HalfRipe
        );
        assert_eq!(
            StrategyKind::Histogram.classify(&aggregate, &config).unwrap(),
            Ripeness::Ripe
        );
    }

    #[test]
    fn foreign_aggregate_is_rejected() {
        let config = RipenessConfig::default();
        let histogram = Aggregate::Histogram {
            histogram: None,
            population: Population {
                total: 0,
                considered: 0,
            },
        };
        for kind in [StrategyKind::LabClusters, StrategyKind::GlobalMean] {
            assert!(matches!(
                kind.classify(&histogram, &config),
                Err(RipenessError::InvalidInput(_))
            ));
        }
        let means = Aggregate::Means {
            means: None,
            score: None,
            population: Population {
                total: 0,
                considered: 0,
            },
        };
        for kind in [StrategyKind::MaskedHistogram, StrategyKind::Histogram] {
            assert!(kind.classify(&means, &config).is_err(), "{kind}");
        }
    }

    #[test]
    fn strategy_serializes_as_name() {
        let json = serde_json::to_string(&StrategyKind::GlobalMean).unwrap();
        assert_eq!(json, r#""GlobalMean""#);
    }
}
