//! Raster encoder for rendered frames.
//!
//! Masked RGB canvases are encoded as PNG (lossless, default) or JPEG at a
//! configurable quality. Images returned by the external decoder are decoded
//! here too, so they can be masked and re-encoded in the same format as
//! natively rendered frames.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageReader, RgbImage};

use crate::error::RenderError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// OutputFormat
// =============================================================================

/// Encoding used for rendered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg {
        quality: u8,
    },
}

impl OutputFormat {
    pub fn jpeg(quality: u8) -> Self {
        OutputFormat::Jpeg {
            quality: clamp_quality(quality),
        }
    }

    pub const fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg { .. } => "image/jpeg",
        }
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }
}

// =============================================================================
// FrameEncoder
// =============================================================================

/// Encodes RGB canvases and decodes external images.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder {
    format: OutputFormat,
}

impl FrameEncoder {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Encode a canvas in the configured format.
    ///
    /// # Errors
    /// `RenderError::Encode` if the codec rejects the image.
    pub fn encode(&self, image: &RgbImage) -> Result<Bytes, RenderError> {
        let (width, height) = image.dimensions();
        let mut output = Vec::new();

        let result = match self.format {
            OutputFormat::Png => PngEncoder::new(&mut output).write_image(
                image.as_raw(),
                width,
                height,
                image::ExtendedColorType::Rgb8,
            ),
            OutputFormat::Jpeg { quality } => {
                JpegEncoder::new_with_quality(&mut output, clamp_quality(quality))
                    .encode_image(image)
            }
        };
        result.map_err(|e| RenderError::Encode {
            message: e.to_string(),
        })?;

        Ok(Bytes::from(output))
    }

    /// Decode a PNG or JPEG produced elsewhere into an RGB canvas.
    ///
    /// # Errors
    /// `RenderError::Decode` if the format is not recognised or the data is
    /// corrupt.
    pub fn decode(&self, source: &[u8]) -> Result<RgbImage, RenderError> {
        let reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| RenderError::Decode {
                message: e.to_string(),
            })?;

        let image = reader.decode().map_err(|e| RenderError::Decode {
            message: e.to_string(),
        })?;

        Ok(image.to_rgb8())
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
