//! Image container detection and PNG normalisation
//!
//! Detection only looks at the magic-byte prefix; it never decodes.

use std::fmt;
use std::io::Cursor;

use crate::error::GrowthError;

const PNG_SIGNATURE: &[u8] = b"\x89PNG";
const JPEG_SOI: &[u8] = b"\xff\xd8\xff";
const RIFF_TAG: &[u8] = b"RIFF";
const WEBP_TAG: &[u8] = b"WEBP";

/// Minimum length for any recognised signature
const MIN_SIGNATURE_LEN: usize = 4;

/// Recognised image container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn label(self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Webp => "WEBP",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify `data` by its signature. `None` means invalid.
pub fn detect_image_format(data: &[u8]) -> Option<ImageFormat> {
    if data.len() < MIN_SIGNATURE_LEN {
        return None;
    }

    if data.starts_with(PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if data.starts_with(JPEG_SOI) {
        Some(ImageFormat::Jpeg)
    } else if data.starts_with(RIFF_TAG) && data.get(8..12) == Some(WEBP_TAG) {
        Some(ImageFormat::Webp)
    } else {
        None
    }
}

/// `(is_valid, format)` view of [`detect_image_format`]
pub fn is_valid_image_data(data: &[u8]) -> (bool, Option<ImageFormat>) {
    let format = detect_image_format(data);
    (format.is_some(), format)
}

/// Decode a validated image and re-encode it as an RGBA PNG
pub fn reencode_as_png(data: &[u8]) -> Result<Vec<u8>, GrowthError> {
    let decoded =
        image::load_from_memory(data).map_err(|e| GrowthError::ImageProcessing(e.to_string()))?;
    let rgba = image::DynamicImage::ImageRgba8(decoded.to_rgba8());

    let mut buffer = Cursor::new(Vec::new());
    rgba.write_to(&mut buffer, image::ImageOutputFormat::Png)
        .map_err(|e| GrowthError::ImageProcessing(e.to_string()))?;

    Ok(buffer.into_inner())
}
