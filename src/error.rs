use thiserror::Error;

use crate::dicom::Tag;

/// Structural errors raised while walking a DICOM byte stream.
///
/// Only corruption of the container is a hard failure. Absent tags are never
/// reported here; they resolve to the "Unknown" sentinel in the tag table.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Neither a `DICM` marker after the preamble nor a bare file meta group
    #[error("Not a DICOM Part-10 stream: missing DICM marker")]
    MissingMagic,

    /// Stream ended inside an element header
    #[error("Truncated stream: need {needed} bytes at offset {offset}, only {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Explicit VR header carries an unknown VR code
    #[error("Invalid VR for {tag} at offset {offset}")]
    InvalidVr { tag: Tag, offset: usize },

    /// Element value runs past the end of the buffer
    #[error("Value of {tag} at offset {offset} has length {length}, only {available} bytes remain")]
    ValueOutOfBounds {
        tag: Tag,
        offset: usize,
        length: usize,
        available: usize,
    },

    /// Undefined-length sequence without a delimitation item
    #[error("Sequence {tag} has undefined length and no delimitation item")]
    UnterminatedSequence { tag: Tag },
}

/// Errors locating or typing the pixel samples.
///
/// Every variant demotes the decode to the external-process tier.
#[derive(Debug, Clone, Error)]
pub enum PixelError {
    /// Rows or Columns absent or zero
    #[error("Invalid image dimensions: rows={rows:?}, cols={cols:?}")]
    Dimension { rows: Option<u32>, cols: Option<u32> },

    /// No (7FE0,0010) element in the data set
    #[error("Pixel data element is missing")]
    MissingPixelData,

    /// The typed view would read past the end of the pixel data
    #[error("Pixel data too short: need {required} bytes, have {available}")]
    BufferTooShort { required: usize, available: usize },

    /// Only 8- and 16-bit samples are supported natively
    #[error("Unsupported bits allocated: {0} (only 8 and 16 are supported)")]
    UnsupportedBitsAllocated(u16),

    /// Encapsulated (compressed) pixel data
    #[error("Compressed transfer syntax {0} cannot be decoded natively")]
    CompressedTransferSyntax(String),
}

/// Errors producing or reading raster images.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// Failed to encode a rendered frame
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// Failed to decode an image produced by the external decoder
    #[error("Decode error: {message}")]
    Decode { message: String },
}

/// Temp-file and local filesystem errors.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Failed to create a temp file
    #[error("Temp file error: {0}")]
    TempFile(String),

    /// Failed to read a file
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    /// Failed to write a file
    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },
}

/// Errors from the external-process decoder tier.
#[derive(Debug, Clone, Error)]
pub enum SubprocessError {
    /// Interpreter binary could not be found or probed
    #[error("Interpreter not available: {0}")]
    InterpreterMissing(String),

    /// No decoder script configured
    #[error("No external decoder script configured")]
    NotConfigured,

    /// Spawning the process failed
    #[error("Failed to spawn decoder: {0}")]
    Spawn(String),

    /// Process exited unsuccessfully
    #[error("Decoder exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// Standard output was not the expected JSON object
    #[error("Malformed decoder output: {0}")]
    MalformedOutput(String),

    /// The script ran but reported `success: false`
    #[error("Decoder reported failure")]
    ReportedFailure,

    /// The caller aborted the request while the process was running
    #[error("Decoder aborted by caller")]
    Aborted,

    /// Temp file handling failed
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Invalid configuration. These are programmer errors and are raised eagerly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Anonymization zones out of range or overlapping too much
    #[error("Invalid anonymization zones: {0}")]
    InvalidZones(String),

    /// `max_frames` must be at least 1
    #[error("max_frames must be at least 1")]
    InvalidMaxFrames,

    /// JPEG quality outside 1-100
    #[error("Invalid JPEG quality: {0} (must be 1-100)")]
    InvalidQuality(u8),
}

/// Why a decode tier could not produce frames.
///
/// Never returned from `DicomDecoder::decode`; it becomes a fallthrough reason.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Pixel(#[from] PixelError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}
