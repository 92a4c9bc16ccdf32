//! Optional downsampling to a working resolution.
//!
//! Every aggregator treats the image as a multiset of colors, so shrinking
//! it trades a little accuracy for a large speedup on camera-sized input,
//! mostly in the clustering strategy. The default filter is
//! [`DownsampleFilter::Disabled`]: classification then sees every pixel.
//!
//! If the image is already at or below the target resolution, it is
//! returned unchanged.

use std::fmt;

use image::RgbImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Resampling filter used when downsampling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `Disabled` variant to skip downsampling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Skip downsampling regardless of image size.
    #[default]
    Disabled,
    /// Nearest-neighbor: fastest, keeps the exact source colors.
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian: smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    /// Every filter, in the order above.
    pub const ALL: [Self; 6] = [
        Self::Disabled,
        Self::Nearest,
        Self::Triangle,
        Self::CatmullRom,
        Self::Gaussian,
        Self::Lanczos3,
    ];

    /// Convert to the `image` crate's `FilterType`, `None` when disabled.
    const fn to_image_filter(self) -> Option<FilterType> {
        match self {
            Self::Disabled => None,
            Self::Nearest => Some(FilterType::Nearest),
            Self::Triangle => Some(FilterType::Triangle),
            Self::CatmullRom => Some(FilterType::CatmullRom),
            Self::Gaussian => Some(FilterType::Gaussian),
            Self::Lanczos3 => Some(FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Target size that fits `(width, height)` inside a
/// `max_dimension`-square box, preserving aspect ratio. Neither axis
/// drops below one pixel.
fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let long_axis = u64::from(width.max(height));
    let scale = |axis: u32| {
        let scaled = (u64::from(axis) * u64::from(max_dimension) + long_axis / 2) / long_axis;
        u32::try_from(scaled).unwrap_or(max_dimension).max(1)
    };
    (scale(width), scale(height))
}

/// Resized copy of `image` whose longest axis is at most `max_dimension`
/// pixels, or `None` when the filter is disabled or the image already
/// fits. The source is only borrowed.
#[must_use]
pub fn resized(image: &RgbImage, max_dimension: u32, filter: DownsampleFilter) -> Option<RgbImage> {
    let image_filter = filter.to_image_filter()?;
    let (w, h) = image.dimensions();
    if w.max(h) <= max_dimension || max_dimension == 0 {
        return None;
    }
    let (nw, nh) = fit_within(w, h, max_dimension);
    Some(image::imageops::resize(image, nw, nh, image_filter))
}

/// Downsample an image so the longest axis is at most `max_dimension`
/// pixels, using the specified resampling filter.
///
/// Returns the (possibly unchanged) image and whether downsampling was
/// actually applied.
#[must_use]
pub fn downsample(
    image: RgbImage,
    max_dimension: u32,
    filter: DownsampleFilter,
) -> (RgbImage, bool) {
    match resized(&image, max_dimension, filter) {
        Some(smaller) => (smaller, true),
        None => (image, false),
    }
}
