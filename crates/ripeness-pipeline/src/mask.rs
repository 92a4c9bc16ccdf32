//! Background mask: keep only saturated, not over-exposed pixels.
//!
//! Near-white background, gray table tops and specular highlights all
//! have either low saturation or a value close to one. Dropping them
//! before the hue histogram leaves mostly fruit skin.
//!
//! The mask is purely color-based, so pixel position is irrelevant and
//! the survivors are returned as a flat list.

use serde::{Deserialize, Serialize};

use crate::hsv::Hsv;
use crate::types::RipenessError;

/// Saturation/value thresholds of the background mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskThresholds {
    /// Pixels must have saturation strictly above this.
    pub min_saturation: f64,
    /// Pixels must have value strictly below this.
    pub max_value: f64,
}

impl MaskThresholds {
    /// Default saturation floor.
    pub const DEFAULT_MIN_SATURATION: f64 = 0.25;

    /// Default value ceiling.
    pub const DEFAULT_MAX_VALUE: f64 = 0.95;

    /// Whether a pixel survives the mask.
    #[must_use]
    pub fn keeps(&self, pixel: &Hsv) -> bool {
        pixel.saturation > self.min_saturation && pixel.value < self.max_value
    }

    /// Check both thresholds are finite and in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`RipenessError::InvalidConfig`] if either threshold is out
    /// of range.
    pub fn validate(&self) -> Result<(), RipenessError> {
        for (name, v) in [
            ("mask.min_saturation", self.min_saturation),
            ("mask.max_value", self.max_value),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(RipenessError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for MaskThresholds {
    fn default() -> Self {
        Self {
            min_saturation: Self::DEFAULT_MIN_SATURATION,
            max_value: Self::DEFAULT_MAX_VALUE,
        }
    }
}

/// Return the pixels that survive the mask, in input order.
#[must_use = "returns the masked pixels"]
pub fn apply_mask(pixels: &[Hsv], thresholds: &MaskThresholds) -> Vec<Hsv> {
    pixels
        .iter()
        .filter(|p| thresholds.keeps(p))
        .copied()
        .collect()
}
