//! RGB to CIE L*a*b* conversion (D65 white point).
//!
//! The sRGB transfer function is inverted (linear segment below 0.04045,
//! 2.4 power above), the linear color is taken to XYZ with the standard
//! sRGB matrix, normalized by the D65 reference white and pushed through
//! the CIE response (cube root above 216/24389, linear below). The math is
//! delegated to `palette`; this module only adapts it to the pipeline's
//! sample and plane types.

use palette::white_point::D65;
use palette::{FromColor, LinSrgb, Srgb};
use serde::{Deserialize, Serialize};

use crate::types::{ColorPlane, Pixels};

/// A color in CIE L*a*b* coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    /// Lightness, `[0, 100]`.
    pub l: f64,
    /// Green (negative) to red (positive) axis.
    pub a: f64,
    /// Blue (negative) to yellow (positive) axis.
    pub b: f64,
}

impl Lab {
    /// Create a new L*a*b* coordinate.
    #[must_use]
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// Coordinates as a fixed-size array, in `[l, a, b]` order.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.l, self.a, self.b]
    }
}

/// Convert one normalized `[r, g, b]` sample to L*a*b*.
#[must_use]
pub fn rgb_to_lab([r, g, b]: [f64; 3]) -> Lab {
    let linear: LinSrgb<f64> = Srgb::new(r, g, b).into_linear();
    let lab = palette::Lab::<D65, f64>::from_color(linear);
    Lab::new(lab.l, lab.a, lab.b)
}

/// Convert every sample of an image to L*a*b*, preserving pixel order.
#[must_use = "returns the converted L*a*b* plane"]
pub fn convert(pixels: &Pixels) -> ColorPlane<Lab> {
    ColorPlane::new(
        pixels.dimensions(),
        pixels.samples().iter().copied().map(rgb_to_lab).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_point_maps_to_l100() {
        let lab = rgb_to_lab([1.0, 1.0, 1.0]);
        assert!((lab.l - 100.0).abs() < 0.01, "L = {}", lab.l);
        assert!(lab.a.abs() < 0.01, "a = {}", lab.a);
        assert!(lab.b.abs() < 0.01, "b = {}", lab.b);
    }

    #[test]
    fn black_maps_to_origin() {
        let lab = rgb_to_lab([0.0, 0.0, 0.0]);
        assert!(lab.l.abs() < 1e-9);
        assert!(lab.a.abs() < 1e-9);
        assert!(lab.b.abs() < 1e-9);
    }

    #[test]
    fn pure_red_reference_values() {
        // Reference sRGB red: L=53.24, a=80.09, b=67.20.
        let lab = rgb_to_lab([1.0, 0.0, 0.0]);
        assert!((lab.l - 53.24).abs() < 0.1, "L = {}", lab.l);
        assert!((lab.a - 80.09).abs() < 0.2, "a = {}", lab.a);
        assert!((lab.b - 67.20).abs() < 0.2, "b = {}", lab.b);
    }

    #[test]
    fn pure_green_has_negative_a() {
        // Reference sRGB green: L=87.73, a=-86.18, b=83.18.
        let lab = rgb_to_lab([0.0, 1.0, 0.0]);
        assert!((lab.l - 87.73).abs() < 0.1, "L = {}", lab.l);
        assert!((lab.a + 86.18).abs() < 0.2, "a = {}", lab.a);
    }

    #[test]
    fn mid_gray_is_neutral() {
        let lab = rgb_to_lab([0.5, 0.5, 0.5]);
        assert!(lab.a.abs() < 0.01);
        assert!(lab.b.abs() < 0.01);
        assert!(lab.l > 50.0 && lab.l < 56.0, "L = {}", lab.l);
    }

    #[test]
    fn conversion_is_deterministic() {
        let first = rgb_to_lab([0.8, 0.45, 0.12]);
        let second = rgb_to_lab([0.8, 0.45, 0.12]);
        assert_eq!(first.to_array().map(f64::to_bits), second.to_array().map(f64::to_bits));
    }
}
