//! ripeness-pipeline: Fruit ripeness from color features (sans-IO).
//!
//! Classifies a photograph of a single fruit as Unripe, Half-ripe or Ripe
//! from its color distribution alone:
//! decode -> optional downsample -> color-space conversion ->
//! feature aggregation -> rule-based classification.
//!
//! Four interchangeable strategies share that shape (see
//! [`StrategyKind`]): a masked hue histogram, an unmasked hue histogram,
//! k-means dominant colors in CIE L*a*b*, and a weighted score over
//! global HSV means. An image with no usable pixels is reported as
//! [`Ripeness::NotDetected`] rather than as an error.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and pixel buffers and returns structured data. File
//! handling and logging setup live in the `ripeness` CLI.

pub mod classify;
pub mod cluster;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod histogram;
pub mod hsv;
pub mod lab;
pub mod mask;
pub mod pipeline;
pub mod stats;
pub mod strategy;
pub mod types;

pub use classify::{HistogramRule, ProportionThresholds, ScoreThresholds};
pub use cluster::{Cluster, ClusterConfig, LabRules};
pub use diagnostics::{Clock, Diagnostics, classify_with_diagnostics};
pub use downsample::DownsampleFilter;
pub use histogram::{HueBands, HueRange};
pub use hsv::Hsv;
pub use lab::Lab;
pub use mask::MaskThresholds;
pub use pipeline::Pipeline;
pub use stats::{GlobalMeans, ScoreWeights};
pub use strategy::{Aggregate, ColorSamples, Strategy, StrategyKind};
pub use types::{
    Breakdown, Classification, ColorCategory, Dimensions, Feature, FeatureWeight, Pixels,
    Population, RgbImage, Ripeness, RipenessConfig, RipenessError,
};

/// Classify a decoded RGB image.
///
/// # Pipeline steps
///
/// 1. Optional downsampling to `config.working_resolution`
/// 2. Normalization to `[0, 1]` and conversion to HSV or LAB
/// 3. Aggregation (histogram, clusters or means, per `config.strategy`)
/// 4. The strategy's rule set
///
/// The image is borrowed; only a downsampled copy is ever allocated. Use
/// [`Pipeline::from_image`] to inspect the intermediate stages.
///
/// # Errors
///
/// Returns [`RipenessError::InvalidConfig`] if `config` fails
/// validation, or [`RipenessError::Clustering`] if k-means fails.
pub fn classify(
    image: &RgbImage,
    config: &RipenessConfig,
) -> Result<Classification, RipenessError> {
    config.validate()?;
    let smaller = downsample::resized(image, config.working_resolution, config.downsample_filter);
    let pixels = Pixels::from_rgb_image(smaller.as_ref().unwrap_or(image));
    strategy::run(config.strategy, &pixels, config)
}

/// Decode image bytes (PNG, JPEG, BMP, WebP) and classify them.
///
/// # Errors
///
/// Returns [`RipenessError::EmptyInput`] if `image_bytes` is empty,
/// [`RipenessError::ImageDecode`] if the format is unrecognized, plus the
/// errors of [`classify`].
pub fn classify_bytes(
    image_bytes: &[u8],
    config: &RipenessConfig,
) -> Result<Classification, RipenessError> {
    let image = decode::decode(image_bytes)?;
    classify(&image, config)
}

/// Classify already-normalized samples. Downsampling does not apply.
///
/// # Errors
///
/// Returns [`RipenessError::InvalidConfig`] if `config` fails
/// validation, or [`RipenessError::Clustering`] if k-means fails.
pub fn classify_pixels(
    pixels: &Pixels,
    config: &RipenessConfig,
) -> Result<Classification, RipenessError> {
    config.validate()?;
    strategy::run(config.strategy, pixels, config)
}
