//! ripeness: classify fruit photographs by ripeness from their colors.
//!
//! Two subcommands:
//!
//! - `classify` labels one or more images (in parallel) and prints the
//!   feature breakdown each verdict was derived from.
//! - `bench` runs one image repeatedly and prints per-stage timing and
//!   count diagnostics, for tuning thresholds and comparing strategies.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin ripeness -- classify [OPTIONS] <IMAGES>...
//! cargo run --release --bin ripeness -- bench [OPTIONS] <IMAGE>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use ripeness_pipeline::diagnostics::{Clock, Diagnostics};
use ripeness_pipeline::{
    Classification, ClusterConfig, DownsampleFilter, Feature, HistogramRule, MaskThresholds,
    RipenessConfig, StrategyKind,
};
use serde::Serialize;

/// Classify fruit ripeness from the color distribution of a photograph.
#[derive(Parser)]
#[command(name = "ripeness", version)]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset (e.g. `warn`, `debug`,
    /// `ripeness_pipeline=trace`).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify one or more images.
    Classify(ClassifyArgs),
    /// Time every pipeline stage on a single image.
    Bench(BenchArgs),
}

#[derive(Args)]
struct ClassifyArgs {
    /// Input images (PNG, JPEG, BMP, WebP).
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Worker threads; defaults to one per core.
    #[arg(long, short = 'j', value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    jobs: Option<usize>,

    /// Output results as JSON instead of text.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct BenchArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Pipeline parameters shared by both subcommands.
#[derive(Args)]
struct ConfigArgs {
    /// Classification strategy.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_STRATEGY)]
    strategy: Strategy,

    /// Decision policy of the masked histogram.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_MASKED_RULE)]
    masked_rule: Rule,

    /// Decision policy of the unmasked histogram.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_UNMASKED_RULE)]
    unmasked_rule: Rule,

    /// Mask: keep pixels with saturation above this.
    #[arg(long, default_value_t = MaskThresholds::DEFAULT_MIN_SATURATION)]
    min_saturation: f64,

    /// Mask: keep pixels with value below this.
    #[arg(long, default_value_t = MaskThresholds::DEFAULT_MAX_VALUE)]
    max_value: f64,

    /// Number of k-means clusters.
    #[arg(long, default_value_t = ClusterConfig::DEFAULT_CLUSTERS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    clusters: usize,

    /// k-means seed.
    #[arg(long, default_value_t = ClusterConfig::DEFAULT_SEED)]
    seed: u64,

    /// Most pixels k-means is fitted on; larger images are subsampled.
    #[arg(long, default_value_t = ClusterConfig::DEFAULT_FIT_SAMPLES, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    fit_samples: usize,

    /// Working resolution (max dimension in pixels after downsampling).
    #[arg(long, default_value_t = RipenessConfig::DEFAULT_WORKING_RESOLUTION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_resolution: u32,

    /// Downsample filter; `disabled` keeps every pixel.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,

    /// Full config from a JSON file. Other parameter flags are ignored.
    #[arg(long, conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Full config as a JSON string. Other parameter flags are ignored.
    ///
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Background-masked hue histogram.
    MaskedHistogram,
    /// Hue histogram over every pixel.
    Histogram,
    /// k-means dominant colors in CIE L*a*b*.
    LabClusters,
    /// Weighted score over global HSV means.
    GlobalMean,
}

/// Histogram decision policy.
#[derive(Clone, Copy, ValueEnum)]
enum Rule {
    /// The highest-weight band decides.
    Dominant,
    /// Absolute cut points on Green and Red+Orange.
    Threshold,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Skip downsampling regardless of image size.
    Disabled,
    /// Nearest-neighbor (fastest, keeps source colors).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian (smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

const fn strategy_from_pipeline(s: StrategyKind) -> Strategy {
    match s {
        StrategyKind::MaskedHistogram => Strategy::MaskedHistogram,
        StrategyKind::Histogram => Strategy::Histogram,
        StrategyKind::LabClusters => Strategy::LabClusters,
        StrategyKind::GlobalMean => Strategy::GlobalMean,
    }
}

const fn rule_from_pipeline(r: HistogramRule) -> Rule {
    match r {
        HistogramRule::Dominant => Rule::Dominant,
        HistogramRule::Threshold => Rule::Threshold,
    }
}

const fn filter_from_pipeline(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::Disabled => Filter::Disabled,
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

// CLI defaults derived from the pipeline's so the two cannot diverge.
const CLI_DEFAULT_STRATEGY: Strategy = strategy_from_pipeline(RipenessConfig::DEFAULT_STRATEGY);
const CLI_DEFAULT_MASKED_RULE: Rule = rule_from_pipeline(RipenessConfig::DEFAULT_MASKED_RULE);
const CLI_DEFAULT_UNMASKED_RULE: Rule = rule_from_pipeline(RipenessConfig::DEFAULT_UNMASKED_RULE);
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(RipenessConfig::DEFAULT_DOWNSAMPLE_FILTER);

impl From<Strategy> for StrategyKind {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::MaskedHistogram => Self::MaskedHistogram,
            Strategy::Histogram => Self::Histogram,
            Strategy::LabClusters => Self::LabClusters,
            Strategy::GlobalMean => Self::GlobalMean,
        }
    }
}

impl From<Rule> for HistogramRule {
    fn from(r: Rule) -> Self {
        match r {
            Rule::Dominant => Self::Dominant,
            Rule::Threshold => Self::Threshold,
        }
    }
}

impl From<Filter> for DownsampleFilter {
    fn from(f: Filter) -> Self {
        match f {
            Filter::Disabled => Self::Disabled,
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Build a [`RipenessConfig`] from CLI arguments.
///
/// `--config` and `--config-json` replace every individual parameter
/// flag. The result is validated either way.
fn config_from_args(args: &ConfigArgs) -> Result<RipenessConfig, String> {
    let config = if let Some(ref path) = args.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()))?
    } else if let Some(ref json) = args.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        let defaults = RipenessConfig::default();
        RipenessConfig {
            strategy: args.strategy.into(),
            masked_rule: args.masked_rule.into(),
            unmasked_rule: args.unmasked_rule.into(),
            mask: MaskThresholds {
                min_saturation: args.min_saturation,
                max_value: args.max_value,
            },
            clustering: ClusterConfig {
                clusters: args.clusters,
                seed: args.seed,
                fit_samples: args.fit_samples,
                ..defaults.clustering
            },
            working_resolution: args.working_resolution,
            downsample_filter: args.downsample_filter.into(),
            ..defaults
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(msg) = logging::setup_logging(&cli.log_level) {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Classify(args) => run_classify(&args),
        Command::Bench(args) => run_bench(&args),
    }
}

/// One image's outcome, as printed by `classify --json`.
#[derive(Serialize)]
struct ImageReport {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn classify_file(path: &Path, config: &RipenessConfig) -> ImageReport {
    let outcome = std::fs::read(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))
        .and_then(|bytes| {
            ripeness_pipeline::classify_bytes(&bytes, config).map_err(|e| e.to_string())
        });
    match outcome {
        Ok(result) => {
            tracing::info!(image = %path.display(), label = %result.label, "classified");
            ImageReport {
                image: path.display().to_string(),
                result: Some(result),
                error: None,
            }
        }
        Err(error) => {
            tracing::warn!(image = %path.display(), %error, "classification failed");
            ImageReport {
                image: path.display().to_string(),
                result: None,
                error: Some(error),
            }
        }
    }
}

fn run_classify(args: &ClassifyArgs) -> ExitCode {
    let config = match config_from_args(&args.config) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let classify_all = || -> Vec<ImageReport> {
        args.images
            .par_iter()
            .map(|path| classify_file(path, &config))
            .collect()
    };
    let reports = match args.jobs {
        Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(classify_all),
            Err(e) => {
                eprintln!("Error starting {jobs} worker threads: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => classify_all(),
    };

    if args.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing results: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    if reports.iter().any(|r| r.error.is_some()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_report(report: &ImageReport) {
    match (&report.result, &report.error) {
        (Some(result), _) => {
            println!("{}: {} ({})", report.image, result.label, result.strategy);
            for fw in result.features.iter() {
                match fw.feature {
                    Feature::Color(_) => {
                        println!("  {:<16} {:>6.1}%", fw.feature.label(), fw.weight * 100.0);
                    }
                    Feature::HueMean | Feature::SaturationMean | Feature::BrightnessMean => {
                        println!("  {:<16} {:>7.3}", fw.feature.label(), fw.weight);
                    }
                }
            }
            if let Some(score) = result.display_score() {
                println!("  {:<16} {score:>7.3}", "Score");
            }
        }
        (None, Some(error)) => eprintln!("{}: {error}", report.image),
        (None, None) => eprintln!("{}: no result", report.image),
    }
}

fn run_bench(args: &BenchArgs) -> ExitCode {
    let config = match config_from_args(&args.config) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&args.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        args.image.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", args.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(args.runs);

    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }

        match ripeness_pipeline::classify_with_diagnostics(&image_bytes, &config, &StdClock) {
            Ok((_, diagnostics)) => {
                if args.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }
                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if args.runs > 1 {
            eprintln!();
        }
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[Diagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(32));

    for (index, (name, _)) in first.stages().iter().enumerate() {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<16} {stage_mean:>10.3}ms");
    }
}
