//! # DICOM Render
//!
//! Turns DICOM Part-10 objects into viewable, optionally de-identified PNG or
//! JPEG frames plus a short metadata text block.
//!
//! ## Features
//!
//! - **Native decode**: uncompressed Implicit/Explicit VR Little Endian and
//!   Explicit VR Big Endian, 8- and 16-bit samples, multi-frame objects
//! - **Windowing**: rescale slope/intercept and window center/width, derived
//!   from the data range when the tags are absent
//! - **De-identification**: in-place scrub of identifying header values and
//!   black masks over the image borders where scanners burn in patient text
//! - **Fallback chain**: native → external decoder process → raw passthrough
//! - **Sampling**: at most `max_frames` evenly spread frames or folder files
//!
//! ## Architecture
//!
//! - [`io`] - byte order helpers
//! - [`dicom`] - Part-10 walker, tag table, input classification, metadata text
//! - [`pixel`] - sample extraction, windowing and raster encoding
//! - [`deid`] - tag scrub and raster masks
//! - [`sampling`] - frame and series selection
//! - [`decode`] - the tiered decoder
//! - [`server`] - Axum-based HTTP surface
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use dicom_render::{DecodeRequest, DecoderSettings, DicomDecoder, ProcessDecoder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let decoder = DicomDecoder::new(
//!         DecoderSettings::default(),
//!         ProcessDecoder::new("python3", Some("decode_dicom.py".into())),
//!     )
//!     .expect("default settings are valid");
//!
//!     let bytes = std::fs::read("scan.dcm").unwrap();
//!     let result = decoder
//!         .decode(DecodeRequest::new(bytes).with_anonymize(true))
//!         .await;
//!     println!("{}", result.status());
//! }
//! ```

pub mod config;
pub mod decode;
pub mod deid;
pub mod dicom;
pub mod error;
pub mod io;
pub mod pixel;
pub mod sampling;
pub mod server;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, DecodeConfig, DecoderArgs, FormatArg, ServeConfig};
pub use decode::{
    AbortHandle, AbortSignal, DecodeOutput, DecodeRequest, DecodeResult, DecodeSource,
    DecoderSettings, DicomDecoder, ExternalDecoder, ExternalOutput, ImagePayload, ProcessDecoder,
    RenderedFrame, SeriesOutcome, Tier, TierOutcome,
};
pub use deid::{scrub_tags, AnonymizationZones, ScrubReport};
pub use dicom::{
    classify, is_dicom_bytes, metadata_text, DicomSummary, InputKind, Tag, TagTable,
    TransferSyntax, Vr, DICOM_MIME_TYPE,
};
pub use error::{
    ConfigError, DecodeError, IoError, ParseError, PixelError, RenderError, SubprocessError,
};
pub use io::ByteOrder;
pub use pixel::{
    extract, to_grayscale, FrameEncoder, GrayFrame, OutputFormat, PixelDescriptor, SampleBuffer,
    Window,
};
pub use sampling::{
    select_frames, select_series, FrameSelection, SeriesEntry, SeriesSelection,
    DEFAULT_MAX_FRAMES,
};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
