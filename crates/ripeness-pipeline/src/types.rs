//! Shared types for the ripeness classification pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::{HistogramRule, ProportionThresholds, ScoreThresholds};
use crate::cluster::ClusterConfig;
use crate::downsample::DownsampleFilter;
use crate::histogram::HueBands;
use crate::mask::MaskThresholds;
use crate::stats::ScoreWeights;
use crate::strategy::StrategyKind;

/// Re-export `RgbImage` so downstream crates can hand decoded images to
/// the pipeline without depending on `image` directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Normalized RGB samples of one image.
///
/// Every channel is in `[0, 1]`. Samples are stored row-major but the
/// aggregators treat them as an unordered multiset.
#[derive(Debug, Clone, PartialEq)]
pub struct Pixels {
    dimensions: Dimensions,
    samples: Vec<[f64; 3]>,
}

impl Pixels {
    /// Normalize an 8-bit RGB image.
    #[must_use]
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let samples = image
            .pixels()
            .map(|p| p.0.map(|c| f64::from(c) / 255.0))
            .collect();
        Self {
            dimensions: Dimensions {
                width: image.width(),
                height: image.height(),
            },
            samples,
        }
    }

    /// Build samples from a raw interleaved 8-bit buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidInput`] if `channels` is not 3 or
    /// if `data.len()` is not `width * height * 3`.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: u8,
        data: &[u8],
    ) -> Result<Self, RipenessError> {
        if channels != 3 {
            return Err(RipenessError::InvalidInput(format!(
                "expected 3 color channels, got {channels}"
            )));
        }
        let dimensions = Dimensions { width, height };
        let expected = dimensions.pixel_count() * 3;
        if data.len() as u64 != expected {
            return Err(RipenessError::InvalidInput(format!(
                "buffer holds {} bytes but {width}x{height}x3 needs {expected}",
                data.len(),
            )));
        }
        let samples = data
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]].map(|v| f64::from(v) / 255.0))
            .collect();
        Ok(Self {
            dimensions,
            samples,
        })
    }

    /// Wrap already-normalized samples.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidInput`] if the sample count does not
    /// match the dimensions, or if any channel is non-finite or outside
    /// `[0, 1]`.
    pub fn from_normalized(
        width: u32,
        height: u32,
        samples: Vec<[f64; 3]>,
    ) -> Result<Self, RipenessError> {
        let dimensions = Dimensions { width, height };
        if samples.len() as u64 != dimensions.pixel_count() {
            return Err(RipenessError::InvalidInput(format!(
                "{} samples do not fill a {width}x{height} image",
                samples.len(),
            )));
        }
        if let Some((index, sample)) = samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.iter().any(|c| !c.is_finite() || !(0.0..=1.0).contains(c)))
        {
            return Err(RipenessError::InvalidInput(format!(
                "sample {index} is not a finite value in [0, 1]: {sample:?}"
            )));
        }
        Ok(Self {
            dimensions,
            samples,
        })
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The normalized samples, row-major.
    #[must_use]
    pub fn samples(&self) -> &[[f64; 3]] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the image has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-pixel color coordinates with the shape of the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorPlane<T> {
    dimensions: Dimensions,
    values: Vec<T>,
}

impl<T> ColorPlane<T> {
    /// Create a plane from row-major values.
    #[must_use]
    pub const fn new(dimensions: Dimensions, values: Vec<T>) -> Self {
        Self { dimensions, values }
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Row-major per-pixel values.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the plane has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Named color buckets used by the histogram and cluster breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorCategory {
    Green,
    Yellow,
    Orange,
    Red,
    /// Dark pixels in the histograms, brownish centroids in the clusters.
    Brown,
}

impl ColorCategory {
    /// All categories in breakdown order. Dominance ties resolve to the
    /// earliest entry.
    pub const ALL: [Self; 5] = [
        Self::Green,
        Self::Yellow,
        Self::Orange,
        Self::Red,
        Self::Brown,
    ];
}

impl fmt::Display for ColorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Feature::Color(*self).label())
    }
}

/// One named entry of a [`Breakdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Feature {
    /// Proportion of pixels (or cluster mass) in a color bucket.
    Color(ColorCategory),
    /// Mean hue in degrees.
    HueMean,
    /// Mean saturation.
    SaturationMean,
    /// Mean value.
    BrightnessMean,
}

impl Feature {
    /// Human-readable name, also used as the serialized key.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Color(ColorCategory::Green) => "Green",
            Self::Color(ColorCategory::Yellow) => "Yellow",
            Self::Color(ColorCategory::Orange) => "Orange",
            Self::Color(ColorCategory::Red) => "Red",
            Self::Color(ColorCategory::Brown) => "Brown/Dark",
            Self::HueMean => "Hue mean",
            Self::SaturationMean => "Saturation mean",
            Self::BrightnessMean => "Brightness mean",
        }
    }
}

impl From<ColorCategory> for Feature {
    fn from(category: ColorCategory) -> Self {
        Self::Color(category)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorCategory::ALL
            .into_iter()
            .map(Self::Color)
            .chain([Self::HueMean, Self::SaturationMean, Self::BrightnessMean])
            .find(|f| f.label() == s)
            .ok_or_else(|| format!("unknown feature name: {s:?}"))
    }
}

impl From<Feature> for String {
    fn from(feature: Feature) -> Self {
        feature.label().to_owned()
    }
}

impl TryFrom<String> for Feature {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A single weight in a [`Breakdown`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: Feature,
    pub weight: f64,
}

/// Ordered mapping from named features to weights.
///
/// Proportion breakdowns from the hue histograms may overlap (a dark
/// pixel also falls in its hue band), so their weights need not sum to
/// one. Cluster breakdowns are a true partition. Mean breakdowns hold
/// independent statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Breakdown(Vec<FeatureWeight>);

impl Breakdown {
    /// An empty breakdown.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Set the weight of a feature, replacing any previous entry.
    pub fn set(&mut self, feature: impl Into<Feature>, weight: f64) {
        let feature = feature.into();
        match self.0.iter_mut().find(|fw| fw.feature == feature) {
            Some(existing) => existing.weight = weight,
            None => self.0.push(FeatureWeight { feature, weight }),
        }
    }

    /// Weight of a feature, if present.
    #[must_use]
    pub fn get(&self, feature: impl Into<Feature>) -> Option<f64> {
        let feature = feature.into();
        self.0
            .iter()
            .find(|fw| fw.feature == feature)
            .map(|fw| fw.weight)
    }

    /// Weight of a color category, zero when absent.
    #[must_use]
    pub fn color(&self, category: ColorCategory) -> f64 {
        self.get(category).unwrap_or(0.0)
    }

    /// The highest-weight feature. Ties keep the earliest entry.
    #[must_use]
    pub fn dominant(&self) -> Option<FeatureWeight> {
        self.0.iter().copied().fold(None, |best, fw| match best {
            Some(b) if b.weight >= fw.weight => Some(b),
            _ => Some(fw),
        })
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.0.iter().map(|fw| fw.weight).sum()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureWeight> {
        self.0.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the breakdown has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Feature, f64)> for Breakdown {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        let mut breakdown = Self::new();
        for (feature, weight) in iter {
            breakdown.set(feature, weight);
        }
        breakdown
    }
}

/// Ripeness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ripeness {
    Unripe,
    HalfRipe,
    Ripe,
    /// No pixel survived masking or the image was empty.
    NotDetected,
}

impl fmt::Display for Ripeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unripe => f.write_str("Unripe"),
            Self::HalfRipe => f.write_str("Half-ripe"),
            Self::Ripe => f.write_str("Ripe"),
            Self::NotDetected => f.write_str("Not detected"),
        }
    }
}

/// How many pixels an aggregator looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population {
    /// Pixels in the (possibly downsampled) image.
    pub total: usize,
    /// Pixels that survived masking and entered the features.
    pub considered: usize,
}

/// Result of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Strategy that produced the result.
    pub strategy: StrategyKind,
    /// Ripeness verdict.
    pub label: Ripeness,
    /// Feature weights the verdict was derived from. Empty when
    /// `label` is [`Ripeness::NotDetected`].
    pub features: Breakdown,
    /// Continuous ripeness score, only for [`StrategyKind::GlobalMean`].
    /// Unclipped; see [`Self::display_score`].
    pub score: Option<f64>,
    /// Pixel counts seen by the aggregator.
    pub population: Population,
    /// Dimensions of the image the features were computed on.
    pub dimensions: Dimensions,
}

impl Classification {
    /// The score clipped to `[0, 1]` for presentation.
    #[must_use]
    pub fn display_score(&self) -> Option<f64> {
        self.score.map(|s| s.clamp(0.0, 1.0))
    }
}

/// Configuration for the ripeness pipeline.
///
/// Every threshold the strategies use is a field here so that tuning
/// never touches the algorithms. Call [`validate`](Self::validate) (the
/// pipeline entry points do) before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RipenessConfig {
    /// Which converter/aggregator/classifier triple to run.
    pub strategy: StrategyKind,

    /// Decision policy for [`StrategyKind::MaskedHistogram`].
    pub masked_rule: HistogramRule,

    /// Decision policy for [`StrategyKind::Histogram`].
    pub unmasked_rule: HistogramRule,

    /// Background/washed-out pixel filter for the masked histogram.
    pub mask: MaskThresholds,

    /// Hue band boundaries shared by both histograms.
    pub hue_bands: HueBands,

    /// Cut points for [`HistogramRule::Threshold`].
    pub histogram_thresholds: ProportionThresholds,

    /// k-means parameters and centroid bucketing rules.
    pub clustering: ClusterConfig,

    /// Cut points for the cluster breakdown.
    pub cluster_thresholds: ProportionThresholds,

    /// Weights of the global-mean ripeness score.
    pub score_weights: ScoreWeights,

    /// Cut points for the global-mean ripeness score.
    pub score_thresholds: ScoreThresholds,

    /// Longest image axis after downsampling, in pixels.
    pub working_resolution: u32,

    /// Resampling filter; [`DownsampleFilter::Disabled`] keeps every pixel.
    pub downsample_filter: DownsampleFilter,
}

impl RipenessConfig {
    /// Default strategy.
    pub const DEFAULT_STRATEGY: StrategyKind = StrategyKind::MaskedHistogram;

    /// Default policy of the masked histogram.
    pub const DEFAULT_MASKED_RULE: HistogramRule = HistogramRule::Dominant;

    /// Default policy of the unmasked histogram.
    pub const DEFAULT_UNMASKED_RULE: HistogramRule = HistogramRule::Threshold;

    /// Default working resolution when downsampling is enabled.
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 512;

    /// Default resampling filter.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Disabled;

    /// Check every field for finite, in-range values.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), RipenessError> {
        self.mask.validate()?;
        self.hue_bands.validate()?;
        self.histogram_thresholds.validate("histogram_thresholds")?;
        self.clustering.validate()?;
        self.cluster_thresholds.validate("cluster_thresholds")?;
        self.score_weights.validate()?;
        self.score_thresholds.validate()?;
        if self.working_resolution == 0 {
            return Err(RipenessError::InvalidConfig(
                "working_resolution must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for RipenessConfig {
    fn default() -> Self {
        Self {
            strategy: Self::DEFAULT_STRATEGY,
            masked_rule: Self::DEFAULT_MASKED_RULE,
            unmasked_rule: Self::DEFAULT_UNMASKED_RULE,
            mask: MaskThresholds::default(),
            hue_bands: HueBands::default(),
            histogram_thresholds: ProportionThresholds::HISTOGRAM,
            clustering: ClusterConfig::default(),
            cluster_thresholds: ProportionThresholds::CLUSTERS,
            score_weights: ScoreWeights::default(),
            score_thresholds: ScoreThresholds::default(),
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
        }
    }
}

/// Errors that can occur during classification.
///
/// An empty population is not an error: it yields
/// [`Ripeness::NotDetected`].
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum RipenessError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pixel data has the wrong shape or holds non-finite values.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is invalid.
    #[error("invalid ripeness configuration: {0}")]
    InvalidConfig(String),

    /// The clustering backend rejected the data.
    #[error("clustering failed: {0}")]
    Clustering(String),
}

/// Serde-compatible proxy for `RipenessError`.
///
/// A deserialized `ImageDecode` becomes `InvalidInput` carrying the
/// original message, since `image::ImageError` cannot be rebuilt.
#[derive(Serialize, Deserialize)]
enum RipenessErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidInput(String),
    InvalidConfig(String),
    Clustering(String),
}

impl Serialize for RipenessError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => RipenessErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => RipenessErrorProxy::EmptyInput,
            Self::InvalidInput(s) => RipenessErrorProxy::InvalidInput(s.clone()),
            Self::InvalidConfig(s) => RipenessErrorProxy::InvalidConfig(s.clone()),
            Self::Clustering(s) => RipenessErrorProxy::Clustering(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RipenessError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = RipenessErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            RipenessErrorProxy::ImageDecode(msg) => {
                Self::InvalidInput(format!("image decode error: {msg}"))
            }
            RipenessErrorProxy::EmptyInput => Self::EmptyInput,
            RipenessErrorProxy::InvalidInput(s) => Self::InvalidInput(s),
            RipenessErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            RipenessErrorProxy::Clustering(s) => Self::Clustering(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Pixels tests ---

    #[test]
    fn from_raw_normalizes_channels() {
        let pixels = Pixels::from_raw(1, 1, 3, &[255, 0, 51]).unwrap();
        let [r, g, b] = pixels.samples()[0];
        assert!((r - 1.0).abs() < f64::EPSILON);
        assert!(g.abs() < f64::EPSILON);
        assert!((b - 0.2).abs() < 1e-12);
    }

    #[test]
    fn from_raw_rejects_wrong_channel_count() {
        let result = Pixels::from_raw(1, 1, 4, &[1, 2, 3, 4]);
        assert!(matches!(result, Err(RipenessError::InvalidInput(_))));
    }

    #[test]
    fn from_raw_rejects_short_buffer() {
        let result = Pixels::from_raw(2, 2, 3, &[0; 11]);
        assert!(matches!(result, Err(RipenessError::InvalidInput(_))));
    }

    #[test]
    fn from_normalized_rejects_nan() {
        let result = Pixels::from_normalized(2, 1, vec![[0.1, 0.2, 0.3], [f64::NAN, 0.0, 0.0]]);
        assert!(
            matches!(result, Err(RipenessError::InvalidInput(ref msg)) if msg.contains("sample 1")),
            "expected InvalidInput naming sample 1, got {result:?}",
        );
    }

    #[test]
    fn from_normalized_rejects_out_of_range() {
        let result = Pixels::from_normalized(1, 1, vec![[1.5, 0.0, 0.0]]);
        assert!(matches!(result, Err(RipenessError::InvalidInput(_))));
    }

    #[test]
    fn from_normalized_rejects_count_mismatch() {
        let result = Pixels::from_normalized(2, 2, vec![[0.0; 3]]);
        assert!(matches!(result, Err(RipenessError::InvalidInput(_))));
    }

    #[test]
    fn from_rgb_image_matches_from_raw() {
        let img = RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8 * 40, y as u8 * 90, 7]));
        let a = Pixels::from_rgb_image(&img);
        let b = Pixels::from_raw(3, 2, 3, img.as_raw()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dimensions(), Dimensions { width: 3, height: 2 });
    }

    // --- Breakdown tests ---

    #[test]
    fn breakdown_set_replaces() {
        let mut b = Breakdown::new();
        b.set(ColorCategory::Green, 0.2);
        b.set(ColorCategory::Green, 0.7);
        assert_eq!(b.len(), 1);
        assert_eq!(b.get(ColorCategory::Green), Some(0.7));
    }

    #[test]
    fn breakdown_dominant_ties_keep_first() {
        let b: Breakdown = [
            (Feature::Color(ColorCategory::Green), 0.4),
            (Feature::Color(ColorCategory::Red), 0.4),
        ]
        .into_iter()
        .collect();
        let dominant = b.dominant().unwrap();
        assert_eq!(dominant.feature, Feature::Color(ColorCategory::Green));
    }

    #[test]
    fn breakdown_missing_color_is_zero() {
        let b = Breakdown::new();
        assert!(b.color(ColorCategory::Orange).abs() < f64::EPSILON);
        assert!(b.dominant().is_none());
    }

    #[test]
    fn feature_labels_round_trip_through_from_str() {
        for category in ColorCategory::ALL {
            let feature = Feature::Color(category);
            assert_eq!(feature.label().parse::<Feature>().unwrap(), feature);
        }
        assert_eq!("Hue mean".parse::<Feature>().unwrap(), Feature::HueMean);
        assert!("Purple".parse::<Feature>().is_err());
    }

    #[test]
    fn breakdown_serializes_with_labels() {
        let mut b = Breakdown::new();
        b.set(ColorCategory::Brown, 0.25);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, r#"[{"feature":"Brown/Dark","weight":0.25}]"#);
        let back: Breakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    // --- Ripeness tests ---

    #[test]
    fn ripeness_display() {
        assert_eq!(Ripeness::Unripe.to_string(), "Unripe");
        assert_eq!(Ripeness::HalfRipe.to_string(), "Half-ripe");
        assert_eq!(Ripeness::Ripe.to_string(), "Ripe");
        assert_eq!(Ripeness::NotDetected.to_string(), "Not detected");
    }

    #[test]
    fn display_score_is_clipped() {
        let c = Classification {
            strategy: StrategyKind::GlobalMean,
            label: Ripeness::Ripe,
            features: Breakdown::new(),
            score: Some(1.3),
            population: Population {
                total: 1,
                considered: 1,
            },
            dimensions: Dimensions {
                width: 1,
                height: 1,
            },
        };
        assert_eq!(c.display_score(), Some(1.0));
    }

    // --- RipenessConfig tests ---

    #[test]
    fn config_defaults() {
        let config = RipenessConfig::default();
        assert_eq!(config.strategy, StrategyKind::MaskedHistogram);
        assert_eq!(config.masked_rule, HistogramRule::Dominant);
        assert_eq!(config.unmasked_rule, HistogramRule::Threshold);
        assert!((config.mask.min_saturation - 0.25).abs() < f64::EPSILON);
        assert!((config.mask.max_value - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.clustering.clusters, 5);
        assert_eq!(config.downsample_filter, DownsampleFilter::Disabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_working_resolution() {
        let config = RipenessConfig {
            working_resolution: 0,
            ..RipenessConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RipenessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let config: RipenessConfig =
            serde_json::from_str(r#"{"strategy":"LabClusters"}"#).unwrap();
        assert_eq!(config.strategy, StrategyKind::LabClusters);
        assert_eq!(config.clustering, ClusterConfig::default());
    }

    #[test]
    fn config_serde_round_trip() {
        let mut config = RipenessConfig {
            strategy: StrategyKind::Histogram,
            masked_rule: HistogramRule::Threshold,
            working_resolution: 128,
            downsample_filter: DownsampleFilter::Nearest,
            ..RipenessConfig::default()
        };
        config.clustering.seed = 7;
        let json = serde_json::to_string(&config).unwrap();
        let back: RipenessConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    // --- RipenessError tests ---

    #[test]
    fn error_display() {
        assert_eq!(
            RipenessError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            RipenessError::InvalidConfig("clusters must be at least 1".to_owned()).to_string(),
            "invalid ripeness configuration: clusters must be at least 1",
        );
    }

    #[test]
    fn error_serde_round_trip() {
        let err = RipenessError::Clustering("bad".to_owned());
        let json = serde_json::to_string(&err).unwrap();
        let back: RipenessError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, RipenessError::Clustering(ref s) if s == "bad"));
    }

    #[test]
    fn classification_result_serde_round_trip() {
        let mut features = Breakdown::new();
        features.set(ColorCategory::Green, 0.9);
        let result: Result<Classification, RipenessError> = Ok(Classification {
            strategy: StrategyKind::MaskedHistogram,
            label: Ripeness::Unripe,
            features,
            score: None,
            population: Population {
                total: 4,
                considered: 4,
            },
            dimensions: Dimensions {
                width: 2,
                height: 2,
            },
        });
        let json = serde_json::to_string(&result).unwrap();
        let back: Result<Classification, RipenessError> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.unwrap(), result.unwrap());
    }
}
