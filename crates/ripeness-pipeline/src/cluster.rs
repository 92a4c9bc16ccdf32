//! Dominant-color clustering in CIE L*a*b*.
//!
//! Pixels are grouped with k-means (`linfa-clustering`, seeded so repeated
//! runs agree bit for bit), each centroid is bucketed into one
//! [`ColorCategory`] by [`LabRules`], and the population fractions of the
//! clusters sharing a bucket are summed. Unlike the hue histograms this
//! is a partition: the bucket weights sum to one.
//!
//! Centroids are fitted on at most [`ClusterConfig::fit_samples`] pixels
//! drawn with the seeded RNG; every pixel of the population is then
//! assigned to its nearest centroid. Fitting cost is therefore bounded
//! regardless of the photo's resolution.
//!
//! When the fitting sample holds no more distinct colors than the
//! requested cluster count, k-means would converge to exactly those
//! colors. That case is answered directly, which also keeps degenerate
//! inputs (a flat synthetic swatch, a handful of pixels) away from the
//! seeding step.

use std::borrow::Cow;

use linfa::DatasetBase;
use linfa::traits::Fit;
use linfa_clustering::KMeans;
use ndarray::Array2;
use rand_xoshiro::Xoshiro256Plus;
use rand_xoshiro::rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::lab::Lab;
use crate::types::{Breakdown, ColorCategory, Feature, RipenessError};

/// Priority-ordered thresholds that bucket a centroid.
///
/// Evaluated in order: Green, Yellow, Orange, Red, otherwise Brown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabRules {
    /// Green when `a` is below this.
    pub green_below_a: f64,
    /// Yellow when `b` is above this ...
    pub yellow_above_b: f64,
    /// ... and `a` is below this.
    pub yellow_below_a: f64,
    /// Orange when `a` is above this ...
    pub orange_above_a: f64,
    /// ... and `b` is above this.
    pub orange_above_b: f64,
    /// Red when `a` is above this.
    pub red_above_a: f64,
}

impl LabRules {
    /// Bucket a centroid.
    #[must_use]
    pub fn categorize(&self, centroid: Lab) -> ColorCategory {
        let Lab { a, b, .. } = centroid;
        if a < self.green_below_a {
            ColorCategory::Green
        } else if b > self.yellow_above_b && a < self.yellow_below_a {
            ColorCategory::Yellow
        } else if a > self.orange_above_a && b > self.orange_above_b {
            ColorCategory::Orange
        } else if a > self.red_above_a {
            ColorCategory::Red
        } else {
            ColorCategory::Brown
        }
    }

    fn validate(&self) -> Result<(), RipenessError> {
        let fields = [
            ("green_below_a", self.green_below_a),
            ("yellow_above_b", self.yellow_above_b),
            ("yellow_below_a", self.yellow_below_a),
            ("orange_above_a", self.orange_above_a),
            ("orange_above_b", self.orange_above_b),
            ("red_above_a", self.red_above_a),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, v)) => Err(RipenessError::InvalidConfig(format!(
                "clustering.rules.{name} must be finite, got {v}"
            ))),
            None => Ok(()),
        }
    }
}

impl Default for LabRules {
    fn default() -> Self {
        Self {
            green_below_a: -10.0,
            yellow_above_b: 30.0,
            yellow_below_a: 20.0,
            orange_above_a: 20.0,
            orange_above_b: 20.0,
            red_above_a: 35.0,
        }
    }
}

/// k-means parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of clusters (k).
    pub clusters: usize,
    /// Seed of the centroid initialization RNG.
    pub seed: u64,
    /// Iteration cap per run.
    pub max_iterations: u64,
    /// Convergence tolerance on centroid movement.
    pub tolerance: f64,
    /// Independent initializations; the lowest-inertia run wins.
    pub runs: usize,
    /// Most pixels the centroids are fitted on. Larger populations are
    /// subsampled with the seeded RNG before fitting.
    pub fit_samples: usize,
    /// Centroid bucketing rules.
    pub rules: LabRules,
}

impl ClusterConfig {
    /// Default cluster count.
    pub const DEFAULT_CLUSTERS: usize = 5;

    /// Default RNG seed.
    pub const DEFAULT_SEED: u64 = 42;

    /// Default iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: u64 = 300;

    /// Default convergence tolerance.
    pub const DEFAULT_TOLERANCE: f64 = 1e-4;

    /// Default number of initializations.
    pub const DEFAULT_RUNS: usize = 10;

    /// Default fitting sample size.
    pub const DEFAULT_FIT_SAMPLES: usize = 4096;

    /// Check the k-means parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] for a zero cluster count,
    /// iteration cap, run count or fitting sample size, a non-positive
    /// tolerance, or a
    /// non-finite bucketing threshold.
    pub fn validate(&self) -> Result<(), RipenessError> {
        if self.clusters == 0 {
            return Err(RipenessError::InvalidConfig(
                "clustering.clusters must be at least 1".to_owned(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(RipenessError::InvalidConfig(
                "clustering.max_iterations must be at least 1".to_owned(),
            ));
        }
        if self.runs == 0 {
            return Err(RipenessError::InvalidConfig(
                "clustering.runs must be at least 1".to_owned(),
            ));
        }
        if self.fit_samples == 0 {
            return Err(RipenessError::InvalidConfig(
                "clustering.fit_samples must be at least 1".to_owned(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(RipenessError::InvalidConfig(format!(
                "clustering.tolerance must be positive, got {}",
                self.tolerance,
            )));
        }
        self.rules.validate()
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            clusters: Self::DEFAULT_CLUSTERS,
            seed: Self::DEFAULT_SEED,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            tolerance: Self::DEFAULT_TOLERANCE,
            runs: Self::DEFAULT_RUNS,
            fit_samples: Self::DEFAULT_FIT_SAMPLES,
            rules: LabRules::default(),
        }
    }
}

/// One cluster of the partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster center.
    pub centroid: Lab,
    /// Fraction of all pixels assigned to this cluster.
    pub proportion: f64,
    /// Bucket of the centroid.
    pub category: ColorCategory,
}

/// Partition `pixels` into at most `config.clusters` clusters.
///
/// Returns `Ok(None)` for an empty population.
///
/// # Errors
///
/// Returns [`RipenessError::Clustering`] if the k-means backend rejects
/// the data or parameters.
pub fn cluster_lab(
    pixels: &[Lab],
    config: &ClusterConfig,
) -> Result<Option<Vec<Cluster>>, RipenessError> {
    if pixels.is_empty() {
        return Ok(None);
    }

    let groups = match distinct_colors(pixels, config.clusters) {
        Some(groups) => groups,
        None => kmeans(pixels, config)?,
    };

    #[allow(clippy::cast_precision_loss)]
    let total = pixels.len() as f64;
    Ok(Some(
        groups
            .into_iter()
            .map(|(centroid, count)| {
                #[allow(clippy::cast_precision_loss)]
                let proportion = count as f64 / total;
                Cluster {
                    centroid,
                    proportion,
                    category: config.rules.categorize(centroid),
                }
            })
            .collect(),
    ))
}

/// Sum cluster proportions per bucket, in [`ColorCategory::ALL`] order.
#[must_use]
pub fn bucket_proportions(clusters: &[Cluster]) -> Breakdown {
    ColorCategory::ALL
        .into_iter()
        .map(|category| {
            let weight = clusters
                .iter()
                .filter(|c| c.category == category)
                .map(|c| c.proportion)
                .sum();
            (Feature::from(category), weight)
        })
        .collect()
}

/// Distinct colors with their counts, in first-seen order, or `None` once
/// more than `limit` distinct colors have been seen.
fn distinct_colors(pixels: &[Lab], limit: usize) -> Option<Vec<(Lab, usize)>> {
    let mut seen: Vec<([u64; 3], Lab, usize)> = Vec::with_capacity(limit + 1);
    for &pixel in pixels {
        let key = pixel.to_array().map(f64::to_bits);
        if let Some(entry) = seen.iter_mut().find(|(k, _, _)| *k == key) {
            entry.2 += 1;
        } else {
            if seen.len() == limit {
                return None;
            }
            seen.push((key, pixel, 1));
        }
    }
    Some(seen.into_iter().map(|(_, lab, count)| (lab, count)).collect())
}

/// At most `limit` pixels drawn uniformly (with replacement) by a
/// seeded RNG, or the whole population when it is already that small.
fn fit_sample(pixels: &[Lab], limit: usize, seed: u64) -> Cow<'_, [Lab]> {
    if pixels.len() <= limit {
        return Cow::Borrowed(pixels);
    }
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    let len = pixels.len() as u64;
    #[allow(clippy::cast_possible_truncation)]
    let sample = (0..limit)
        .map(|_| pixels[(rng.next_u64() % len) as usize])
        .collect();
    Cow::Owned(sample)
}

/// Fit centroids on a bounded sample, then count every pixel against its
/// nearest centroid.
fn kmeans(pixels: &[Lab], config: &ClusterConfig) -> Result<Vec<(Lab, usize)>, RipenessError> {
    let sample = fit_sample(pixels, config.fit_samples, config.seed);
    let centroids = match distinct_colors(&sample, config.clusters) {
        Some(groups) => groups.into_iter().map(|(lab, _)| lab).collect(),
        None => fit_centroids(&sample, config)?,
    };

    let mut counts = vec![0_usize; centroids.len()];
    for &pixel in pixels {
        if let Some(count) = counts.get_mut(nearest(&centroids, pixel)) {
            *count += 1;
        }
    }

    tracing::debug!(
        clusters = centroids.len(),
        fitted = sample.len(),
        samples = pixels.len(),
        "k-means converged"
    );

    Ok(centroids.into_iter().zip(counts).collect())
}

/// Run seeded k-means on `sample` and return the centroids.
fn fit_centroids(sample: &[Lab], config: &ClusterConfig) -> Result<Vec<Lab>, RipenessError> {
    let flat: Vec<f64> = sample.iter().flat_map(|p| p.to_array()).collect();
    let records = Array2::from_shape_vec((sample.len(), 3), flat)
        .map_err(|e| RipenessError::Clustering(e.to_string()))?;
    let dataset = DatasetBase::from(records);

    let rng = Xoshiro256Plus::seed_from_u64(config.seed);
    let model = KMeans::params_with_rng(config.clusters, rng)
        .max_n_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .n_runs(config.runs)
        .fit(&dataset)
        .map_err(|e| RipenessError::Clustering(e.to_string()))?;

    Ok(model
        .centroids()
        .rows()
        .into_iter()
        .map(|row| Lab::new(row[0], row[1], row[2]))
        .collect())
}

/// Index of the centroid closest to `pixel` (squared Euclidean distance);
/// ties go to the earlier centroid.
fn nearest(centroids: &[Lab], pixel: Lab) -> usize {
    let [l, a, b] = pixel.to_array();
    centroids
        .iter()
        .map(|c| {
            let [cl, ca, cb] = c.to_array();
            (l - cl).powi(2) + (a - ca).powi(2) + (b - cb).powi(2)
        })
        .enumerate()
        .min_by(|x, y| x.1.total_cmp(&y.1))
        .map_or(0, |(index, _)| index)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::lab::rgb_to_lab;

    #[test]
    fn empty_population_is_none() {
        assert!(cluster_lab(&[], &ClusterConfig::default()).unwrap().is_none());
    }

    #[test]
    fn categorize_priority_order() {
        let rules = LabRules::default();
        assert_eq!(rules.categorize(Lab::new(50.0, -40.0, 60.0)), ColorCategory::Green);
        assert_eq!(rules.categorize(Lab::new(80.0, 5.0, 70.0)), ColorCategory::Yellow);
        assert_eq!(rules.categorize(Lab::new(60.0, 40.0, 60.0)), ColorCategory::Orange);
        assert_eq!(rules.categorize(Lab::new(40.0, 50.0, 10.0)), ColorCategory::Red);
        assert_eq!(rules.categorize(Lab::new(30.0, 10.0, 10.0)), ColorCategory::Brown);
    }

    #[test]
    fn green_rule_wins_over_yellow() {
        // Satisfies both Green (a < -10) and Yellow (b > 30, a < 20).
        let rules = LabRules::default();
        assert_eq!(rules.categorize(Lab::new(80.0, -20.0, 70.0)), ColorCategory::Green);
    }

    #[test]
    fn orange_rule_wins_over_red() {
        // a > 35 would be Red, but a > 20 && b > 20 is checked first.
        let rules = LabRules::default();
        assert_eq!(rules.categorize(Lab::new(50.0, 60.0, 30.0)), ColorCategory::Orange);
    }

    #[test]
    fn pure_red_swatch_is_one_orange_cluster() {
        let red = rgb_to_lab([1.0, 0.0, 0.0]);
        let clusters = cluster_lab(&[red; 4], &ClusterConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(clusters.len(), 1);
        assert!((clusters[0].proportion - 1.0).abs() < 1e-12);
        assert_eq!(clusters[0].category, ColorCategory::Orange);
    }

    #[test]
    fn few_distinct_colors_skip_kmeans() {
        let green = rgb_to_lab([0.0, 1.0, 0.0]);
        let brown = rgb_to_lab([0.3, 0.2, 0.1]);
        let pixels = [green, green, green, brown];
        let clusters = cluster_lab(&pixels, &ClusterConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].centroid, green);
        assert!((clusters[0].proportion - 0.75).abs() < 1e-12);
        assert!((clusters[1].proportion - 0.25).abs() < 1e-12);
    }

    /// 50 greenish and 50 reddish pixels with slight variation, enough
    /// distinct colors to force the k-means path.
    fn two_tone() -> Vec<Lab> {
        (0..100_u32)
            .map(|i| {
                let jitter = f64::from(i % 10) * 0.01;
                if i < 50 {
                    rgb_to_lab([0.1, 0.55 + jitter, 0.1])
                } else {
                    rgb_to_lab([0.8 + jitter, 0.15, 0.1])
                }
            })
            .collect()
    }

    #[test]
    fn kmeans_partition_sums_to_one() {
        let clusters = cluster_lab(&two_tone(), &ClusterConfig::default())
            .unwrap()
            .unwrap();
        assert!(clusters.len() <= ClusterConfig::DEFAULT_CLUSTERS);
        let breakdown = bucket_proportions(&clusters);
        assert!((breakdown.total() - 1.0).abs() < 1e-9);
        assert!((breakdown.color(ColorCategory::Green) - 0.5).abs() < 1e-9);
        assert!(
            (breakdown.color(ColorCategory::Orange) + breakdown.color(ColorCategory::Red) - 0.5)
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn kmeans_is_reproducible_with_fixed_seed() {
        let pixels = two_tone();
        let config = ClusterConfig::default();
        let first = cluster_lab(&pixels, &config).unwrap().unwrap();
        let second = cluster_lab(&pixels, &config).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fit_sample_is_bounded_and_seeded() {
        let pixels: Vec<Lab> = (0..10_000_u32)
            .map(|i| Lab::new(f64::from(i % 100), f64::from(i / 100), 0.0))
            .collect();
        let first = fit_sample(&pixels, 256, 7);
        assert_eq!(first.len(), 256);
        assert!(matches!(first, Cow::Owned(_)));
        assert_eq!(first, fit_sample(&pixels, 256, 7));
        assert_ne!(first, fit_sample(&pixels, 256, 8));
    }

    #[test]
    fn small_population_is_fitted_whole() {
        let pixels = two_tone();
        let sample = fit_sample(&pixels, ClusterConfig::DEFAULT_FIT_SAMPLES, 42);
        assert!(matches!(sample, Cow::Borrowed(_)));
        assert_eq!(sample.len(), pixels.len());
    }

    #[test]
    fn subsampled_fit_still_partitions_every_pixel() {
        // 20 000 pixels, fitted on 200.
        let pixels: Vec<Lab> = two_tone().into_iter().cycle().take(20_000).collect();
        let config = ClusterConfig {
            fit_samples: 200,
            ..ClusterConfig::default()
        };
        let clusters = cluster_lab(&pixels, &config).unwrap().unwrap();
        let breakdown = bucket_proportions(&clusters);
        assert!((breakdown.total() - 1.0).abs() < 1e-9);
        assert!((breakdown.color(ColorCategory::Green) - 0.5).abs() < 1e-9);
        assert_eq!(clusters, cluster_lab(&pixels, &config).unwrap().unwrap());
    }

    #[test]
    fn skewed_sample_with_few_colors_assigns_rare_pixels_to_nearest() {
        // One red pixel among 9 999 green ones; a 16-pixel sample almost
        // surely misses it, and the red pixel still lands in a cluster.
        let green = rgb_to_lab([0.1, 0.6, 0.1]);
        let dark_green = rgb_to_lab([0.05, 0.4, 0.05]);
        let mut pixels: Vec<Lab> = (0..9_999_u32)
            .map(|i| if i % 2 == 0 { green } else { dark_green })
            .collect();
        pixels.push(rgb_to_lab([0.9, 0.1, 0.1]));
        let config = ClusterConfig {
            clusters: 2,
            fit_samples: 16,
            ..ClusterConfig::default()
        };
        let clusters = cluster_lab(&pixels, &config).unwrap().unwrap();
        let total: f64 = clusters.iter().map(|c| c.proportion).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nearest_prefers_earlier_centroid_on_ties() {
        let centroids = [Lab::new(0.0, 0.0, 0.0), Lab::new(10.0, 0.0, 0.0)];
        assert_eq!(nearest(&centroids, Lab::new(5.0, 0.0, 0.0)), 0);
        assert_eq!(nearest(&centroids, Lab::new(6.0, 0.0, 0.0)), 1);
    }

    #[test]
    fn validate_rejects_zero_fit_samples() {
        let config = ClusterConfig {
            fit_samples: 0,
            ..ClusterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bucket_proportions_lists_every_category() {
        let breakdown = bucket_proportions(&[]);
        assert_eq!(breakdown.len(), ColorCategory::ALL.len());
        assert!(breakdown.total().abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_zero_clusters() {
        let config = ClusterConfig {
            clusters: 0,
            ..ClusterConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RipenessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_non_finite_rule() {
        let mut config = ClusterConfig::default();
        config.rules.red_above_a = f64::INFINITY;
        assert!(config.validate().is_err());
    }
}
