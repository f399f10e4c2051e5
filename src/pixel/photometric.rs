//! Rescale and window raw samples into 8-bit grayscale.
//!
//! Every sample goes through `value = raw * slope + intercept`. The window
//! comes from the Window Center/Width tags when the width is positive, and is
//! otherwise derived from the rescaled range of the frame being rendered.
//! Windowing is the linear stretch
//!
//! ```text
//! gray = clamp(((value - (center - width / 2)) / width) * 255, 0, 255)
//! ```
//!
//! truncated toward zero. A flat frame (min == max) gets width 1.

use image::{Rgb, RgbImage};

use super::extract::{PixelDescriptor, SampleBuffer};

/// Smallest window width used for division.
const MIN_WINDOW_WIDTH: f64 = 1.0;

/// ITU-R BT.601 luma weights.
const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

// =============================================================================
// Window
// =============================================================================

/// Window center/width pair, with `width >= 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub center: f64,
    pub width: f64,
}

impl Window {
    pub fn new(center: f64, width: f64) -> Self {
        Self {
            center,
            width: width.max(MIN_WINDOW_WIDTH),
        }
    }

    /// Window spanning `[min, max]`.
    pub fn from_range(min: f64, max: f64) -> Self {
        Self::new((max + min) / 2.0, max - min)
    }

    /// Lower bound of the window.
    #[inline]
    pub fn low(&self) -> f64 {
        self.center - self.width / 2.0
    }

    /// Map a rescaled value to a display level.
    #[inline]
    pub fn apply(&self, value: f64) -> u8 {
        let gray = ((value - self.low()) / self.width) * 255.0;
        gray.clamp(0.0, 255.0) as u8
    }
}

// =============================================================================
// GrayFrame
// =============================================================================

/// One rendered grayscale frame, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,

    /// Window actually used
    pub window: Window,
}

impl GrayFrame {
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Expand to an RGB canvas for masking and encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let v = self.pixel(x, y);
            Rgb([v, v, v])
        })
    }
}

// =============================================================================
// Transform
// =============================================================================

/// Raw intensity of pixel `index`, through luminance for color data.
#[inline]
fn raw_pixel(descriptor: &PixelDescriptor, frame: &SampleBuffer<'_>, index: usize) -> f64 {
    if descriptor.samples_per_pixel != 3 {
        return frame.get(index);
    }

    let (r, g, b) = if descriptor.planar_configuration == 1 {
        let plane = descriptor.pixels_per_frame();
        (
            frame.get(index),
            frame.get(plane + index),
            frame.get(2 * plane + index),
        )
    } else {
        (
            frame.get(index * 3),
            frame.get(index * 3 + 1),
            frame.get(index * 3 + 2),
        )
    };
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

/// Choose the window for a frame.
///
/// Explicit tags win when the width is positive; otherwise the window spans
/// the rescaled range `[min, max]`.
pub fn resolve_window(descriptor: &PixelDescriptor, min: f64, max: f64) -> Window {
    match (descriptor.window_center, descriptor.window_width) {
        (Some(center), Some(width)) if width > 0.0 => Window::new(center, width),
        _ => Window::from_range(min, max),
    }
}

/// Rescaled `[min, max]` over a frame, `None` for an empty frame.
pub fn rescaled_range(descriptor: &PixelDescriptor, frame: &SampleBuffer<'_>) -> Option<(f64, f64)> {
    let slope = descriptor.rescale_slope;
    let intercept = descriptor.rescale_intercept;

    (0..descriptor.pixels_per_frame())
        .map(|index| raw_pixel(descriptor, frame, index) * slope + intercept)
        .fold(None, |range, value| match range {
            None => Some((value, value)),
            Some((min, max)) => Some((f64::min(min, value), f64::max(max, value))),
        })
}

/// Convert one frame of raw samples to windowed grayscale.
///
/// `frame` must hold at least `descriptor.samples_per_frame()` samples; use
/// [`SampleBuffer::frame`] to select it. Samples are read straight from the
/// buffer, once for the range (only when the window is derived) and once
/// for the mapping, so the gray raster is the only allocation.
pub fn to_grayscale(descriptor: &PixelDescriptor, frame: &SampleBuffer<'_>) -> GrayFrame {
    let slope = descriptor.rescale_slope;
    let intercept = descriptor.rescale_intercept;

    let explicit = matches!(descriptor.window_width, Some(width) if width > 0.0)
        && descriptor.window_center.is_some();
    let (min, max) = if explicit {
        (0.0, 0.0)
    } else {
        rescaled_range(descriptor, frame).unwrap_or((0.0, 0.0))
    };
    let window = resolve_window(descriptor, min, max);

    let invert = descriptor.photometric.is_inverted();
    let pixels = (0..descriptor.pixels_per_frame())
        .map(|index| {
            let gray = window.apply(raw_pixel(descriptor, frame, index) * slope + intercept);
            if invert {
                255 - gray
            } else {
                gray
            }
        })
        .collect();

    GrayFrame {
        width: descriptor.cols,
        height: descriptor.rows,
        pixels,
        window,
    }
}

// =============================================================================
// Tests
// =============================================================================
