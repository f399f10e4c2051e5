//! Native pixel pipeline: typed sample extraction, windowing and encoding.

mod encoder;
mod extract;
mod photometric;

pub use encoder::{
    clamp_quality, is_valid_quality, FrameEncoder, OutputFormat, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use extract::{extract, Photometric, PixelDescriptor, SampleBuffer};
pub use photometric::{rescaled_range, resolve_window, to_grayscale, GrayFrame, Window};
