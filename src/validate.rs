//! Pre-upload validation of source images.
//!
//! Every rule violation maps to `VideogenError::ImageRejected` so callers
//! can distinguish a bad image from infrastructure failures.

use crate::error::{Result, VideogenError};
use image::{ImageFormat, ImageReader};
use std::path::Path;

/// Maximum accepted file size in bytes (10 MB).
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Accepted width/height ratio range.
const MIN_ASPECT_RATIO: f64 = 0.4;
const MAX_ASPECT_RATIO: f64 = 2.5;

/// Accepted pixel dimensions.
const MIN_SIDE: u32 = 300;
const MAX_SIDE: u32 = 6000;

const ACCEPTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Validates an image file against the provider upload constraints.
///
/// Checks run cheapest-first: file size, then container format sniffed from
/// the content, then pixel dimensions decoded from the header only.
pub fn validate_image(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        VideogenError::ImageRejected(format!("cannot read image file {}: {e}", path.display()))
    })?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(VideogenError::ImageRejected(format!(
            "image is {} bytes, larger than the {} byte limit",
            metadata.len(),
            MAX_FILE_SIZE
        )));
    }

    let reader = ImageReader::open(path)
        .map_err(|e| {
            VideogenError::ImageRejected(format!(
                "cannot read image file {}: {e}",
                path.display()
            ))
        })?
        .with_guessed_format()
        .map_err(|e| {
            VideogenError::ImageRejected(format!(
                "cannot sniff image format of {}: {e}",
                path.display()
            ))
        })?;

    let format = reader
        .format()
        .ok_or_else(|| VideogenError::ImageRejected("unrecognized image format".into()))?;
    if !ACCEPTED_FORMATS.contains(&format) {
        return Err(VideogenError::ImageRejected(format!(
            "unsupported image format {format:?}; accepted: JPEG, PNG, WEBP, BMP, TIFF"
        )));
    }

    let (width, height) = reader.into_dimensions().map_err(|e| {
        VideogenError::ImageRejected(format!("cannot decode image dimensions: {e}"))
    })?;
    if width == 0 || height == 0 {
        return Err(VideogenError::ImageRejected(
            "image has zero width or height".into(),
        ));
    }

    let aspect = f64::from(width) / f64::from(height);
    if !(MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&aspect) {
        return Err(VideogenError::ImageRejected(format!(
            "aspect ratio {aspect:.2} outside the accepted range [{MIN_ASPECT_RATIO}, {MAX_ASPECT_RATIO}]"
        )));
    }

    let (min_side, max_side) = (width.min(height), width.max(height));
    if min_side < MIN_SIDE {
        return Err(VideogenError::ImageRejected(format!(
            "smallest side is {min_side}px, below the {MIN_SIDE}px minimum"
        )));
    }
    if max_side > MAX_SIDE {
        return Err(VideogenError::ImageRejected(format!(
            "largest side is {max_side}px, above the {MAX_SIDE}px maximum"
        )));
    }

    Ok(())
}
