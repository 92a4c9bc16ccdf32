//! RGB to HSV conversion.
//!
//! Hue is an angle in degrees in `[0, 360)`; saturation and value are in
//! `[0, 1]`. Every division is guarded by [`EPSILON`] so black and gray
//! pixels never produce NaN or infinity.
//!
//! # Tie-break on the max channel
//!
//! When two channels share the maximum, the branches are resolved as if
//! they were applied in sequence: red first, then green overwrites, then
//! blue overwrites. A pixel with `r == g > b` therefore takes the green
//! formula and one with `g == b > r` takes the blue formula. The competing
//! formulas agree to within the epsilon on such inputs.

use serde::{Deserialize, Serialize};

use crate::types::{ColorPlane, Pixels};

/// Guard added to divisors so zero-chroma and black pixels stay finite.
pub const EPSILON: f64 = 1e-6;

/// A color in hue/saturation/value coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue angle in degrees, `[0, 360)`.
    pub hue: f64,
    /// Saturation, `[0, 1]`.
    pub saturation: f64,
    /// Value (brightness), `[0, 1]`.
    pub value: f64,
}

/// Convert one normalized `[r, g, b]` sample to HSV.
#[must_use]
pub fn rgb_to_hsv([r, g, b]: [f64; 3]) -> Hsv {
    let cmax = r.max(g).max(b);
    let cmin = r.min(g).min(b);
    let chroma = cmax - cmin;
    let delta = chroma + EPSILON;

    #[allow(clippy::float_cmp)]
    let hue = if chroma < EPSILON {
        0.0
    } else if b == cmax {
        60.0 * ((r - g) / delta + 4.0)
    } else if g == cmax {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        let h = (60.0 * ((g - b) / delta)).rem_euclid(360.0);
        // rem_euclid can round a tiny negative angle up to exactly 360.
        if h >= 360.0 { 0.0 } else { h }
    };

    Hsv {
        hue,
        saturation: chroma / (cmax + EPSILON),
        value: cmax,
    }
}

/// Convert every sample of an image to HSV, preserving pixel order.
#[must_use = "returns the converted HSV plane"]
pub fn convert(pixels: &Pixels) -> ColorPlane<Hsv> {
    ColorPlane::new(
        pixels.dimensions(),
        pixels.samples().iter().copied().map(rgb_to_hsv).collect(),
    )
}
