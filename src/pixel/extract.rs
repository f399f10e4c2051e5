//! Pixel sample extraction.
//!
//! Reads the image pixel module from the tag table, locates the pixel data
//! element and builds a typed view over its bytes. The view variant is chosen
//! once from Bits Allocated and Pixel Representation, so the photometric
//! transform matches on it instead of casting per sample.
//!
//! A view that would read past the end of the pixel data is the usual sign of
//! a compressed transfer syntax with a mislabelled header, and is reported as
//! [`PixelError::BufferTooShort`] so the decoder can fall back.

use crate::dicom::{Tag, TagTable};
use crate::error::PixelError;
use crate::io::ByteOrder;

/// Bits Allocated assumed when the tag is absent.
const DEFAULT_BITS_ALLOCATED: u16 = 16;

// =============================================================================
// Photometric Interpretation
// =============================================================================

/// How sample values map to display intensity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Photometric {
    /// Minimum sample is white
    Monochrome1,

    /// Minimum sample is black
    Monochrome2,

    /// Three samples per pixel
    Rgb,

    /// Anything else, rendered like MONOCHROME2 (or through luminance when
    /// there are three samples per pixel)
    Other(String),
}

impl Photometric {
    pub fn from_tag(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("MONOCHROME1") => Photometric::Monochrome1,
            Some("MONOCHROME2") | None | Some("") => Photometric::Monochrome2,
            Some("RGB") => Photometric::Rgb,
            Some(other) => Photometric::Other(other.to_string()),
        }
    }

    /// Whether windowed output must be inverted for display.
    #[inline]
    pub fn is_inverted(&self) -> bool {
        matches!(self, Photometric::Monochrome1)
    }
}

// =============================================================================
// PixelDescriptor
// =============================================================================

/// Sample layout and calibration of one image.
///
/// Invariant: `rows > 0` and `cols > 0`; a descriptor is never built otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelDescriptor {
    pub rows: u32,
    pub cols: u32,

    /// 8 or 16
    pub bits_allocated: u16,

    /// Pixel Representation 1 (two's complement)
    pub signed: bool,

    /// At least 1
    pub frame_count: u32,

    /// 1 (grayscale) or 3 (color)
    pub samples_per_pixel: u16,

    /// 0 = interleaved RGBRGB, 1 = planar RRR..GGG..BBB
    pub planar_configuration: u16,

    pub photometric: Photometric,

    pub rescale_slope: f64,
    pub rescale_intercept: f64,

    /// First value of Window Center, if present
    pub window_center: Option<f64>,

    /// First value of Window Width, if present
    pub window_width: Option<f64>,
}

impl PixelDescriptor {
    /// Read the image pixel module from a tag table.
    ///
    /// # Errors
    /// - `Dimension` if Rows or Columns are missing or zero
    /// - `UnsupportedBitsAllocated` for anything but 8 or 16
    pub fn from_table(table: &TagTable) -> Result<Self, PixelError> {
        let rows = table.u32(Tag::ROWS);
        let cols = table.u32(Tag::COLUMNS);
        let (rows, cols) = match (rows, cols) {
            (Some(r), Some(c)) if r > 0 && c > 0 => (r, c),
            _ => return Err(PixelError::Dimension { rows, cols }),
        };

        let bits_allocated = table
            .u16(Tag::BITS_ALLOCATED)
            .unwrap_or(DEFAULT_BITS_ALLOCATED);
        if bits_allocated != 8 && bits_allocated != 16 {
            return Err(PixelError::UnsupportedBitsAllocated(bits_allocated));
        }

        let slope = table
            .f64(Tag::RESCALE_SLOPE)
            .filter(|s| s.is_finite() && *s != 0.0)
            .unwrap_or(1.0);
        let intercept = table
            .f64(Tag::RESCALE_INTERCEPT)
            .filter(|i| i.is_finite())
            .unwrap_or(0.0);

        Ok(Self {
            rows,
            cols,
            bits_allocated,
            signed: table.u16(Tag::PIXEL_REPRESENTATION) == Some(1),
            frame_count: table.u32(Tag::NUMBER_OF_FRAMES).unwrap_or(1).max(1),
            samples_per_pixel: match table.u16(Tag::SAMPLES_PER_PIXEL) {
                Some(3) => 3,
                _ => 1,
            },
            planar_configuration: table.u16(Tag::PLANAR_CONFIGURATION).unwrap_or(0),
            photometric: Photometric::from_tag(table.string(Tag::PHOTOMETRIC_INTERPRETATION)),
            rescale_slope: slope,
            rescale_intercept: intercept,
            window_center: table.f64(Tag::WINDOW_CENTER).filter(|c| c.is_finite()),
            window_width: table.f64(Tag::WINDOW_WIDTH).filter(|w| w.is_finite()),
        })
    }

    #[inline]
    pub fn pixels_per_frame(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    #[inline]
    pub fn samples_per_frame(&self) -> usize {
        self.pixels_per_frame() * self.samples_per_pixel as usize
    }

    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_allocated / 8) as usize
    }

    /// Bytes needed for every frame, or `None` on overflow.
    pub fn required_bytes(&self) -> Option<usize> {
        self.samples_per_frame()
            .checked_mul(self.bytes_per_sample())?
            .checked_mul(self.frame_count as usize)
    }
}

// =============================================================================
// SampleBuffer
// =============================================================================

/// Typed, borrowed view over raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleBuffer<'a> {
    Unsigned8(&'a [u8]),
    Unsigned16 { bytes: &'a [u8], order: ByteOrder },
    Signed16 { bytes: &'a [u8], order: ByteOrder },
}

impl<'a> SampleBuffer<'a> {
    /// Select the view variant for a descriptor.
    pub fn new(descriptor: &PixelDescriptor, bytes: &'a [u8], order: ByteOrder) -> Self {
        match (descriptor.bits_allocated, descriptor.signed) {
            (16, true) => SampleBuffer::Signed16 { bytes, order },
            (16, false) => SampleBuffer::Unsigned16 { bytes, order },
            _ => SampleBuffer::Unsigned8(bytes),
        }
    }

    /// Number of samples in the view.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::Unsigned8(bytes) => bytes.len(),
            SampleBuffer::Unsigned16 { bytes, .. } | SampleBuffer::Signed16 { bytes, .. } => {
                bytes.len() / 2
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw sample value at `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        match self {
            SampleBuffer::Unsigned8(bytes) => bytes[index] as f64,
            SampleBuffer::Unsigned16 { bytes, order } => {
                order.read_u16(&bytes[index * 2..]) as f64
            }
            SampleBuffer::Signed16 { bytes, order } => order.read_i16(&bytes[index * 2..]) as f64,
        }
    }

    /// View over a single frame.
    ///
    /// Returns `None` if the frame lies outside the view.
    pub fn frame(&self, descriptor: &PixelDescriptor, index: u32) -> Option<SampleBuffer<'a>> {
        let frame_bytes = descriptor.samples_per_frame() * descriptor.bytes_per_sample();
        let start = frame_bytes.checked_mul(index as usize)?;
        let end = start.checked_add(frame_bytes)?;

        let slice = |bytes: &'a [u8]| bytes.get(start..end);
        Some(match *self {
            SampleBuffer::Unsigned8(bytes) => SampleBuffer::Unsigned8(slice(bytes)?),
            SampleBuffer::Unsigned16 { bytes, order } => SampleBuffer::Unsigned16 {
                bytes: slice(bytes)?,
                order,
            },
            SampleBuffer::Signed16 { bytes, order } => SampleBuffer::Signed16 {
                bytes: slice(bytes)?,
                order,
            },
        })
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Build the pixel descriptor and typed sample view for a parsed data set.
///
/// # Errors
/// - `Dimension` if Rows/Columns are missing or zero
/// - `MissingPixelData` if there is no pixel data element
/// - `CompressedTransferSyntax` for encapsulated pixel data
/// - `BufferTooShort` if the view would read past the pixel data
pub fn extract<'a>(
    table: &TagTable,
    bytes: &'a [u8],
) -> Result<(PixelDescriptor, SampleBuffer<'a>), PixelError> {
    let descriptor = PixelDescriptor::from_table(table)?;

    let location = table.pixel_data().ok_or(PixelError::MissingPixelData)?;

    let transfer_syntax = table.transfer_syntax();
    if transfer_syntax.is_encapsulated() || location.declared_length.is_none() {
        return Err(PixelError::CompressedTransferSyntax(
            transfer_syntax.uid().to_string(),
        ));
    }

    let available = location.available;
    let required = descriptor
        .required_bytes()
        .ok_or(PixelError::BufferTooShort {
            required: usize::MAX,
            available,
        })?;
    if available < required {
        return Err(PixelError::BufferTooShort {
            required,
            available,
        });
    }

    let start = location.value_offset;
    let samples = &bytes[start..start + required];
    let buffer = SampleBuffer::new(&descriptor, samples, transfer_syntax.byte_order());

    Ok((descriptor, buffer))
}

// =============================================================================
// Tests
// =============================================================================
