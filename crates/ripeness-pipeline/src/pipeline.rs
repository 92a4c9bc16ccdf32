//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::classify_bytes`] which runs everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use ripeness_pipeline::{Pipeline, RipenessConfig, RipenessError};
//! # fn run(png: Vec<u8>) -> Result<(), RipenessError> {
//! let classified = Pipeline::new(png, RipenessConfig::default())?
//!     .decode()?
//!     .downsample()
//!     .convert()
//!     .aggregate()?
//!     .classify()?;
//!
//! println!("{}", classified.label());
//! let result = classified.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages). The caller can inspect the current
//! stage's output via accessor methods at any point.

use crate::diagnostics::StageMetrics;
use crate::strategy::{self, Aggregate, ColorSamples, Strategy};
use crate::types::{
    Classification, Dimensions, Pixels, RgbImage, Ripeness, RipenessConfig, RipenessError,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: RipenessConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::EmptyInput`] if the source bytes are
    /// empty. Returns [`RipenessError::ImageDecode`] if the image
    /// format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, RipenessError> {
        let image = crate::decode::decode(&self.source)?;
        tracing::debug!(
            bytes = self.source.len(),
            width = image.width(),
            height = image.height(),
            "decoded"
        );
        Ok(Decoded {
            config: self.config,
            image,
            source_len: Some(self.source.len()),
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
///
/// Call [`downsample`](Self::downsample) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .downsample() to continue"]
pub struct Decoded {
    config: RipenessConfig,
    image: RgbImage,
    /// `None` when the pipeline was entered with an already-decoded image.
    source_len: Option<usize>,
}

impl Decoded {
    /// The decoded RGB image.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Shrink to the working resolution and normalize the samples.
    pub fn downsample(self) -> Downsampled {
        let original = Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        };
        let (image, applied) = crate::downsample::downsample(
            self.image,
            self.config.working_resolution,
            self.config.downsample_filter,
        );
        let pixels = Pixels::from_rgb_image(&image);
        if applied {
            tracing::debug!(
                from_width = original.width,
                from_height = original.height,
                width = image.width(),
                height = image.height(),
                filter = %self.config.downsample_filter,
                "downsampled"
            );
        }
        Downsampled {
            config: self.config,
            original,
            pixels,
            applied,
        }
    }
}

// ───────────────────────── Stage 2: Downsampled ──────────────────────

/// Pipeline state holding normalized samples at working resolution.
///
/// Call [`convert`](Self::convert) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .convert() to continue"]
pub struct Downsampled {
    config: RipenessConfig,
    original: Dimensions,
    pixels: Pixels,
    applied: bool,
}

impl Downsampled {
    /// The normalized samples.
    #[must_use]
    pub const fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    /// Whether downsampling was actually applied.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Dimensions before downsampling.
    #[must_use]
    pub const fn original_dimensions(&self) -> Dimensions {
        self.original
    }

    /// Convert to the color space of the configured strategy.
    pub fn convert(self) -> Converted {
        let samples = self.config.strategy.convert(&self.pixels);
        tracing::debug!(
            strategy = %self.config.strategy,
            space = samples.space(),
            samples = samples.len(),
            "converted"
        );
        Converted {
            config: self.config,
            samples,
        }
    }
}

// ───────────────────────── Stage 3: Converted ────────────────────────

/// Pipeline state after color-space conversion.
///
/// Call [`aggregate`](Self::aggregate) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .aggregate() to continue"]
pub struct Converted {
    config: RipenessConfig,
    samples: ColorSamples,
}

impl Converted {
    /// Per-pixel color coordinates.
    #[must_use]
    pub const fn samples(&self) -> &ColorSamples {
        &self.samples
    }

    /// Reduce the samples to features.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::Clustering`] if k-means fails.
    pub fn aggregate(self) -> Result<Aggregated, RipenessError> {
        let aggregate = self.config.strategy.aggregate(&self.samples, &self.config)?;
        let population = aggregate.population();
        tracing::debug!(
            total = population.total,
            considered = population.considered,
            "aggregated"
        );
        Ok(Aggregated {
            config: self.config,
            dimensions: self.samples.dimensions(),
            aggregate,
        })
    }
}

// ───────────────────────── Stage 4: Aggregated ───────────────────────

/// Pipeline state after feature aggregation.
///
/// Call [`classify`](Self::classify) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing; call .classify() to continue"]
pub struct Aggregated {
    config: RipenessConfig,
    dimensions: Dimensions,
    aggregate: Aggregate,
}

impl Aggregated {
    /// The aggregated features.
    #[must_use]
    pub const fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    /// Apply the rule set of the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidInput`] if the aggregate does not
    /// belong to the configured strategy.
    pub fn classify(self) -> Result<Classified, RipenessError> {
        let strategy = self.config.strategy;
        let label = strategy.classify(&self.aggregate, &self.config)?;
        tracing::debug!(%strategy, %label, "classified");
        Ok(Classified {
            result: strategy::assemble(strategy, label, &self.aggregate, self.dimensions),
            aggregate: self.aggregate,
        })
    }
}

// ───────────────────────── Stage 5: Classified ───────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to take the classification"]
pub struct Classified {
    aggregate: Aggregate,
    result: Classification,
}

impl Classified {
    /// The verdict.
    #[must_use]
    pub const fn label(&self) -> Ripeness {
        self.result.label
    }

    /// The aggregate the verdict was derived from.
    #[must_use]
    pub const fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    /// The classification result.
    #[must_use]
    pub const fn result(&self) -> &Classification {
        &self.result
    }

    /// Consume the pipeline and return the classification result.
    #[must_use]
    pub fn into_result(self) -> Classification {
        self.result
    }
}

// ───────────────────────── Dynamic API ───────────────────────────────

/// Common interface over the typed stages.
///
/// Each stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds, so the pipeline can be driven in a loop:
///
/// ```rust
/// # use ripeness_pipeline::{Pipeline, RipenessConfig, RipenessError};
/// # use ripeness_pipeline::pipeline::{Advance, Stage};
/// # fn run(png: Vec<u8>) -> Result<(), RipenessError> {
/// let mut stage: Stage = Pipeline::new(png, RipenessConfig::default())?.into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Short name of this stage (e.g. `"source"`, `"convert"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `5` for
    /// Classified).
    const INDEX: usize;

    /// Metrics describing the work done to reach this state. `None` for
    /// [`Pending`], which has done no work yet.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage, or hand back the final stage unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError`] if the stage transition fails.
    fn advance(self) -> Result<Advance, RipenessError>;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<Classification, RipenessError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn advance(self) -> Result<Advance, RipenessError> {
        Ok(Advance::Next(Stage::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<Classification, RipenessError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        let dimensions = Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        };
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width: dimensions.width,
            height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
        })
    }

    fn advance(self) -> Result<Advance, RipenessError> {
        Ok(Advance::Next(Stage::Downsampled(self.downsample())))
    }

    fn complete(self) -> Result<Classification, RipenessError> {
        self.downsample().complete()
    }
}

impl PipelineStage for Downsampled {
    const NAME: &str = "downsample";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        let working = self.pixels.dimensions();
        Some(StageMetrics::Downsample {
            original_width: self.original.width,
            original_height: self.original.height,
            width: working.width,
            height: working.height,
            filter: self.config.downsample_filter.to_string(),
            applied: self.applied,
        })
    }

    fn advance(self) -> Result<Advance, RipenessError> {
        Ok(Advance::Next(Stage::Converted(self.convert())))
    }

    fn complete(self) -> Result<Classification, RipenessError> {
        self.convert().complete()
    }
}

impl PipelineStage for Converted {
    const NAME: &str = "convert";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Convert {
            space: self.samples.space().to_owned(),
            sample_count: self.samples.len(),
        })
    }

    fn advance(self) -> Result<Advance, RipenessError> {
        Ok(Advance::Next(Stage::Aggregated(self.aggregate()?)))
    }

    fn complete(self) -> Result<Classification, RipenessError> {
        self.aggregate()?.complete()
    }
}

impl PipelineStage for Aggregated {
    const NAME: &str = "aggregate";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        let population = self.aggregate.population();
        let cluster_count = match &self.aggregate {
            Aggregate::Clusters { clusters, .. } => clusters.as_ref().map(Vec::len),
            Aggregate::Histogram { .. } | Aggregate::Means { .. } => None,
        };
        Some(StageMetrics::Aggregate {
            strategy: self.config.strategy.to_string(),
            total_pixels: population.total,
            considered_pixels: population.considered,
            cluster_count,
        })
    }

    fn advance(self) -> Result<Advance, RipenessError> {
        Ok(Advance::Next(Stage::Classified(self.classify()?)))
    }

    fn complete(self) -> Result<Classification, RipenessError> {
        Ok(self.classify()?.into_result())
    }
}

impl PipelineStage for Classified {
    const NAME: &str = "classify";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Classify {
            label: self.result.label,
            score: self.result.score,
        })
    }

    fn advance(self) -> Result<Advance, RipenessError> {
        Ok(Advance::Complete(Stage::Classified(self)))
    }

    fn complete(self) -> Result<Classification, RipenessError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Downsampled`].
    Downsampled(Downsampled),
    /// See [`Converted`].
    Converted(Converted),
    /// See [`Aggregated`].
    Aggregated(Aggregated),
    /// See [`Classified`].
    Classified(Classified),
}

/// Total number of stages.
pub const STAGE_COUNT: usize = 6;

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident) => {
        match $self {
            Self::Pending(s) => s.$method(),
            Self::Decoded(s) => s.$method(),
            Self::Downsampled(s) => s.$method(),
            Self::Converted(s) => s.$method(),
            Self::Aggregated(s) => s.$method(),
            Self::Classified(s) => s.$method(),
        }
    };
}

/// Read an associated constant of whichever `Stage` variant is active.
macro_rules! delegate_const {
    ($self:ident, $name:ident) => {
        match $self {
            Self::Pending(_) => <Pending as PipelineStage>::$name,
            Self::Decoded(_) => <Decoded as PipelineStage>::$name,
            Self::Downsampled(_) => <Downsampled as PipelineStage>::$name,
            Self::Converted(_) => <Converted as PipelineStage>::$name,
            Self::Aggregated(_) => <Aggregated as PipelineStage>::$name,
            Self::Classified(_) => <Classified as PipelineStage>::$name,
        }
    };
}

impl Stage {
    /// Short name of the current stage.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        delegate_const!(self, NAME)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub const fn index(&self) -> usize {
        delegate_const!(self, INDEX)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Classified(_))
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, RipenessError> {
        delegate!(self, advance)
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<Classification, RipenessError> {
        delegate!(self, complete)
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Decoded> for Stage {
    fn from(s: Decoded) -> Self {
        Self::Decoded(s)
    }
}

impl From<Downsampled> for Stage {
    fn from(s: Downsampled) -> Self {
        Self::Downsampled(s)
    }
}

impl From<Converted> for Stage {
    fn from(s: Converted) -> Self {
        Self::Converted(s)
    }
}

impl From<Aggregated> for Stage {
    fn from(s: Aggregated) -> Self {
        Self::Aggregated(s)
    }
}

impl From<Classified> for Stage {
    fn from(s: Classified) -> Self {
        Self::Classified(s)
    }
}

/// Entry point for the staged pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order. Every constructor validates the configuration first.
pub struct Pipeline;

impl Pipeline {
    /// Start from encoded image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] if `config` is invalid.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(image_bytes: Vec<u8>, config: RipenessConfig) -> Result<Pending, RipenessError> {
        config.validate()?;
        Ok(Pending {
            config,
            source: image_bytes,
        })
    }

    /// Start from an already-decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] if `config` is invalid.
    pub fn from_image(image: RgbImage, config: RipenessConfig) -> Result<Decoded, RipenessError> {
        config.validate()?;
        Ok(Decoded {
            config,
            image,
            source_len: None,
        })
    }

    /// Start from normalized samples. Downsampling does not apply.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] if `config` is invalid.
    pub fn from_pixels(pixels: Pixels, config: RipenessConfig) -> Result<Downsampled, RipenessError> {
        config.validate()?;
        Ok(Downsampled {
            config,
            original: pixels.dimensions(),
            pixels,
            applied: false,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::downsample::DownsampleFilter;
    use crate::strategy::StrategyKind;

    fn flat_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[allow(clippy::type_complexity)]
    fn drive_to_end(start: Stage) -> Result<(Stage, Vec<(usize, &'static str)>), RipenessError> {
        let mut log = vec![(start.index(), start.name())];
        let mut stage = start;
        loop {
            match stage.advance()? {
                Advance::Next(next) => {
                    log.push((next.index(), next.name()));
                    stage = next;
                }
                Advance::Complete(done) => return Ok((done, log)),
            }
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = RipenessConfig {
            working_resolution: 0,
            ..RipenessConfig::default()
        };
        assert!(matches!(
            Pipeline::new(flat_png(2, 2, [0, 0, 0]), config),
            Err(RipenessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_bytes_fail_at_decode() {
        let pending = Pipeline::new(Vec::new(), RipenessConfig::default()).unwrap();
        assert!(matches!(pending.decode(), Err(RipenessError::EmptyInput)));
    }

    #[test]
    fn chained_stages_expose_intermediates() {
        let config = RipenessConfig {
            strategy: StrategyKind::LabClusters,
            ..RipenessConfig::default()
        };
        let decoded = Pipeline::new(flat_png(4, 3, [30, 180, 40]), config)
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(decoded.image().dimensions(), (4, 3));

        let downsampled = decoded.downsample();
        assert!(!downsampled.applied());
        assert_eq!(downsampled.pixels().len(), 12);

        let converted = downsampled.convert();
        assert_eq!(converted.samples().space(), "LAB");

        let aggregated = converted.aggregate().unwrap();
        assert!(matches!(
            aggregated.aggregate(),
            Aggregate::Clusters { clusters: Some(c), .. } if c.len() == 1
        ));

        let classified = aggregated.classify().unwrap();
        assert_eq!(classified.label(), Ripeness::Unripe);
        assert_eq!(classified.result().dimensions, Dimensions { width: 4, height: 3 });
    }

    #[test]
    fn downsample_is_applied_above_working_resolution() {
        let config = RipenessConfig {
            working_resolution: 8,
            downsample_filter: DownsampleFilter::Nearest,
            ..RipenessConfig::default()
        };
        let downsampled = Pipeline::from_image(RgbImage::new(32, 16), config)
            .unwrap()
            .downsample();
        assert!(downsampled.applied());
        assert_eq!(
            downsampled.original_dimensions(),
            Dimensions {
                width: 32,
                height: 16
            }
        );
        assert_eq!(
            downsampled.pixels().dimensions(),
            Dimensions {
                width: 8,
                height: 4
            }
        );
    }

    #[test]
    fn stage_names_and_indices() {
        let start: Stage = Pipeline::new(flat_png(2, 2, [200, 20, 20]), RipenessConfig::default())
            .unwrap()
            .into();
        let (done, log) = drive_to_end(start).unwrap();
        let expected = [
            (0, "source"),
            (1, "decode"),
            (2, "downsample"),
            (3, "convert"),
            (4, "aggregate"),
            (5, "classify"),
        ];
        assert_eq!(log.as_slice(), &expected);
        assert_eq!(log.len(), STAGE_COUNT);
        assert!(done.is_complete());
    }

    #[test]
    fn loop_to_completion_matches_chained_api() {
        let png = flat_png(3, 3, [220, 120, 20]);
        for strategy in StrategyKind::ALL {
            let config = RipenessConfig {
                strategy,
                ..RipenessConfig::default()
            };
            let chained = Pipeline::new(png.clone(), config.clone())
                .unwrap()
                .decode()
                .unwrap()
                .downsample()
                .convert()
                .aggregate()
                .unwrap()
                .classify()
                .unwrap()
                .into_result();
            let start: Stage = Pipeline::new(png.clone(), config).unwrap().into();
            let (done, _) = drive_to_end(start).unwrap();
            assert_eq!(done.complete().unwrap(), chained, "{strategy}");
        }
    }

    #[test]
    fn pending_has_no_metrics_later_stages_do() {
        let mut stage: Stage =
            Pipeline::new(flat_png(2, 2, [0, 200, 0]), RipenessConfig::default())
                .unwrap()
                .into();
        assert!(stage.metrics().is_none());
        while let Advance::Next(next) = stage.advance().unwrap() {
            assert!(next.metrics().is_some(), "{}", next.name());
            stage = next;
        }
    }

    #[test]
    fn from_pixels_skips_decode() {
        let pixels = Pixels::from_normalized(1, 1, vec![[1.0, 0.0, 0.0]]).unwrap();
        let config = RipenessConfig {
            strategy: StrategyKind::GlobalMean,
            ..RipenessConfig::default()
        };
        let result = Pipeline::from_pixels(pixels, config)
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(result.label, Ripeness::Ripe);
    }
}
