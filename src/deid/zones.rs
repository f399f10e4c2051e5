//! Burned-in text masking.
//!
//! Scanners often print patient details into the image itself, usually along
//! the borders. Each zone is a band along one edge, given as a fraction of
//! the image height (top/bottom) or width (left/right). Pixels inside any
//! band are set to black regardless of content, so masking is idempotent.

use image::{Rgb, RgbImage};

use crate::error::ConfigError;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Largest combined fraction allowed on one axis.
const MAX_AXIS_FRACTION: f64 = 0.5;

/// Edge bands blacked out on every rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnonymizationZones {
    top: f64,
    bottom: f64,
    left: f64,
    right: f64,
}

impl Default for AnonymizationZones {
    fn default() -> Self {
        Self {
            top: 0.10,
            bottom: 0.12,
            left: 0.12,
            right: 0.12,
        }
    }
}

impl AnonymizationZones {
    /// Build zones from edge fractions.
    ///
    /// # Errors
    /// `ConfigError::InvalidZones` if a fraction is outside `[0, 1]` or an
    /// axis would be covered by more than half.
    pub fn new(top: f64, bottom: f64, left: f64, right: f64) -> Result<Self, ConfigError> {
        for (name, value) in [("top", top), ("bottom", bottom), ("left", left), ("right", right)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidZones(format!(
                    "{} fraction {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        if top + bottom > MAX_AXIS_FRACTION {
            return Err(ConfigError::InvalidZones(format!(
                "top + bottom = {} exceeds {}",
                top + bottom,
                MAX_AXIS_FRACTION
            )));
        }
        if left + right > MAX_AXIS_FRACTION {
            return Err(ConfigError::InvalidZones(format!(
                "left + right = {} exceeds {}",
                left + right,
                MAX_AXIS_FRACTION
            )));
        }

        Ok(Self {
            top,
            bottom,
            left,
            right,
        })
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    /// Pixel extents `(top_rows, bottom_rows, left_cols, right_cols)` for an
    /// image of the given size.
    pub fn extents(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let band = |fraction: f64, size: u32| ((fraction * size as f64).ceil() as u32).min(size);
        (
            band(self.top, height),
            band(self.bottom, height),
            band(self.left, width),
            band(self.right, width),
        )
    }

    /// Whether `(x, y)` falls inside any band.
    pub fn contains(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        let (top, bottom, left, right) = self.extents(width, height);
        y < top || y >= height - bottom || x < left || x >= width - right
    }

    /// Black out every band on the canvas.
    pub fn apply(&self, image: &mut RgbImage) {
        let (width, height) = image.dimensions();
        let (top, bottom, left, right) = self.extents(width, height);

        for y in 0..height {
            let full_row = y < top || y >= height - bottom;
            for x in 0..width {
                if full_row || x < left || x >= width - right {
                    image.put_pixel(x, y, BLACK);
                }
            }
        }
    }
}
