//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an 8-bit
//! RGB image. Alpha is discarded; every pixel takes part in
//! classification regardless of transparency.

use image::RgbImage;

use crate::types::RipenessError;

/// Decode raw image bytes into 8-bit RGB.
///
/// # Errors
///
/// Returns [`RipenessError::EmptyInput`] if `bytes` is empty.
/// Returns [`RipenessError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<RgbImage, RipenessError> {
    if bytes.is_empty() {
        return Err(RipenessError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}
