//! Pipeline diagnostics: timing and counts for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! threshold tuning and strategy comparison. Timestamps come from a
//! caller-supplied [`Clock`] so the crate itself performs no I/O and
//! stays deterministic under test.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Advance, Pipeline, Stage};
use crate::types::{Classification, Ripeness, RipenessConfig, RipenessError};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single classification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: downsampling and normalization.
    pub downsample: StageDiagnostics,
    /// Stage 3: color-space conversion.
    pub convert: StageDiagnostics,
    /// Stage 4: feature aggregation.
    pub aggregate: StageDiagnostics,
    /// Stage 5: rule-based classification.
    pub classify: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the run.
    pub summary: Summary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the encoded input, `None` when the pipeline was
        /// entered with a decoded image.
        input_bytes: Option<usize>,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Downsampling metrics.
    Downsample {
        /// Width before downsampling.
        original_width: u32,
        /// Height before downsampling.
        original_height: u32,
        /// Working width.
        width: u32,
        /// Working height.
        height: u32,
        /// Resampling filter name.
        filter: String,
        /// Whether the image was actually resized.
        applied: bool,
    },
    /// Color-space conversion metrics.
    Convert {
        /// Target color space (`"HSV"` or `"LAB"`).
        space: String,
        /// Number of converted samples.
        sample_count: usize,
    },
    /// Feature aggregation metrics.
    Aggregate {
        /// Strategy name.
        strategy: String,
        /// Pixels handed to the aggregator.
        total_pixels: usize,
        /// Pixels that entered the features (after masking).
        considered_pixels: usize,
        /// Number of clusters, for the clustering strategy.
        cluster_count: Option<usize>,
    },
    /// Classification metrics.
    Classify {
        /// The verdict.
        label: Ripeness,
        /// Unclipped score, for the global-mean strategy.
        score: Option<f64>,
    },
}

/// High-level summary of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Working image width in pixels.
    pub image_width: u32,
    /// Working image height in pixels.
    pub image_height: u32,
    /// Working pixel count.
    pub pixel_count: u64,
    /// Pixels that entered the features.
    pub considered_pixels: usize,
    /// The verdict.
    pub label: Ripeness,
}

impl Diagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Ripeness Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Considered pixels: {}  |  Label: {}",
            self.summary.considered_pixels, self.summary.label,
        ));

        lines.join("\n")
    }

    /// Stages in execution order with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("Decode", &self.decode),
            ("Downsample", &self.downsample),
            ("Convert", &self.convert),
            ("Aggregate", &self.aggregate),
            ("Classify", &self.classify),
        ]
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => match input_bytes {
            Some(bytes) => format!("{bytes} bytes -> {width}x{height}"),
            None => format!("{width}x{height}"),
        },
        StageMetrics::Downsample {
            original_width,
            original_height,
            width,
            height,
            filter,
            applied,
        } => {
            if *applied {
                format!("{original_width}x{original_height} -> {width}x{height} ({filter})")
            } else {
                format!("{width}x{height} (not resized)")
            }
        }
        StageMetrics::Convert {
            space,
            sample_count,
        } => format!("{sample_count} samples -> {space}"),
        StageMetrics::Aggregate {
            strategy,
            total_pixels,
            considered_pixels,
            cluster_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let kept = if *total_pixels > 0 {
                *considered_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            let clusters = cluster_count.map_or_else(String::new, |k| format!(" k={k}"));
            format!("{strategy} {considered_pixels}/{total_pixels} px ({kept:.1}%){clusters}")
        }
        StageMetrics::Classify { label, score } => match score {
            Some(s) => format!("{label} (score={s:.3})"),
            None => label.to_string(),
        },
    }
}

/// Time one stage transition, returning the next stage and its record.
fn timed_step<C: Clock>(
    stage: Stage,
    clock: &C,
) -> Result<(Stage, StageDiagnostics), RipenessError> {
    let start = clock.now();
    let next = match stage.advance()? {
        Advance::Next(next) | Advance::Complete(next) => next,
    };
    let duration = clock.elapsed(&start);
    let metrics = next.metrics().ok_or_else(|| {
        RipenessError::InvalidInput(format!("stage {} reported no metrics", next.name()))
    })?;
    Ok((next, StageDiagnostics { duration, metrics }))
}

/// Classify encoded image bytes, timing every stage.
///
/// # Errors
///
/// Returns the same errors as [`crate::classify_bytes`].
pub fn classify_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &RipenessConfig,
    clock: &C,
) -> Result<(Classification, Diagnostics), RipenessError> {
    let run_start = clock.now();
    let stage: Stage = Pipeline::new(image_bytes.to_vec(), config.clone())?.into();

    let (stage, decode) = timed_step(stage, clock)?;
    let (stage, downsample) = timed_step(stage, clock)?;
    let (stage, convert) = timed_step(stage, clock)?;
    let (stage, aggregate) = timed_step(stage, clock)?;
    let (stage, classify) = timed_step(stage, clock)?;
    let result = stage.complete()?;
    let total_duration = clock.elapsed(&run_start);

    let summary = Summary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        pixel_count: result.dimensions.pixel_count(),
        considered_pixels: result.population.considered,
        label: result.label,
    };
    tracing::debug!(
        total_ms = duration_ms(total_duration),
        label = %result.label,
        "diagnostics collected"
    );

    Ok((
        result,
        Diagnostics {
            decode,
            downsample,
            convert,
            aggregate,
            classify,
            total_duration,
            summary,
        },
    ))
}
