//! Hue-band histograms.
//!
//! Pixels are counted into five named bands and the counts are divided by
//! the population size. Four bands are hue ranges; the fifth ("Brown/Dark")
//! is a value ceiling that ignores hue. A dark red pixel is therefore
//! counted twice and the weights of a histogram do not, in general, sum to
//! one.

use serde::{Deserialize, Serialize};

use crate::hsv::Hsv;
use crate::types::{Breakdown, ColorCategory, Feature, RipenessError};

/// Half-open hue interval `[start, end)` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueRange {
    pub start: f64,
    pub end: f64,
}

impl HueRange {
    /// Create a range.
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whether `hue` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, hue: f64) -> bool {
        hue >= self.start && hue < self.end
    }

    fn validate(&self, name: &str) -> Result<(), RipenessError> {
        if !(0.0..=360.0).contains(&self.start)
            || !(0.0..=360.0).contains(&self.end)
            || self.start > self.end
        {
            return Err(RipenessError::InvalidConfig(format!(
                "{name} must satisfy 0 <= start <= end <= 360, got [{}, {})",
                self.start, self.end,
            )));
        }
        Ok(())
    }
}

/// Band boundaries for the hue histograms.
///
/// Red wraps around zero and is the union of two ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueBands {
    pub green: HueRange,
    pub yellow: HueRange,
    pub orange: HueRange,
    /// Red below the wrap point, e.g. `[0, 20)`.
    pub red_low: HueRange,
    /// Red above the wrap point, e.g. `[340, 360)`.
    pub red_high: HueRange,
    /// Pixels with value strictly below this count as dark.
    pub dark_below_value: f64,
}

impl HueBands {
    /// Whether a pixel falls in the band of `category`.
    #[must_use]
    pub fn matches(&self, category: ColorCategory, pixel: &Hsv) -> bool {
        match category {
            ColorCategory::Green => self.green.contains(pixel.hue),
            ColorCategory::Yellow => self.yellow.contains(pixel.hue),
            ColorCategory::Orange => self.orange.contains(pixel.hue),
            ColorCategory::Red => {
                self.red_low.contains(pixel.hue) || self.red_high.contains(pixel.hue)
            }
            ColorCategory::Brown => pixel.value < self.dark_below_value,
        }
    }

    /// Check every range lies inside `[0, 360]` and the dark ceiling in
    /// `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] naming the first bad band.
    pub fn validate(&self) -> Result<(), RipenessError> {
        self.green.validate("hue_bands.green")?;
        self.yellow.validate("hue_bands.yellow")?;
        self.orange.validate("hue_bands.orange")?;
        self.red_low.validate("hue_bands.red_low")?;
        self.red_high.validate("hue_bands.red_high")?;
        if !(0.0..=1.0).contains(&self.dark_below_value) {
            return Err(RipenessError::InvalidConfig(format!(
                "hue_bands.dark_below_value must be in [0, 1], got {}",
                self.dark_below_value,
            )));
        }
        Ok(())
    }
}

impl Default for HueBands {
    fn default() -> Self {
        Self {
            green: HueRange::new(60.0, 140.0),
            yellow: HueRange::new(40.0, 60.0),
            orange: HueRange::new(20.0, 40.0),
            red_low: HueRange::new(0.0, 20.0),
            red_high: HueRange::new(340.0, 360.0),
            dark_below_value: 0.3,
        }
    }
}

/// Fraction of `pixels` in each band, in [`ColorCategory::ALL`] order.
///
/// Returns `None` for an empty population so callers branch to the
/// "not detected" result instead of dividing by zero.
#[must_use]
pub fn hue_histogram(pixels: &[Hsv], bands: &HueBands) -> Option<Breakdown> {
    if pixels.is_empty() {
        return None;
    }

    let mut counts = [0_usize; ColorCategory::ALL.len()];
    for pixel in pixels {
        for (count, category) in counts.iter_mut().zip(ColorCategory::ALL) {
            if bands.matches(category, pixel) {
                *count += 1;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let total = pixels.len() as f64;
    Some(
        ColorCategory::ALL
            .into_iter()
            .zip(counts)
            .map(|(category, count)| {
                #[allow(clippy::cast_precision_loss)]
                let weight = count as f64 / total;
                (Feature::from(category), weight)
            })
            .collect(),
    )
}
