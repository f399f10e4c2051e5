//! Decode orchestration with fallback tiers.
//!
//! - [`DicomDecoder`]: runs native → external → passthrough
//! - [`ExternalDecoder`]: capability for the out-of-process tier
//! - [`DecodeResult`]: `Success`, `Degraded` or `Failure`

mod external;
mod orchestrator;
mod result;
mod strategy;

pub use external::{
    AbortHandle, AbortSignal, ExternalDecoder, ExternalOutput, ProcessDecoder, ScratchFiles,
};
pub use orchestrator::{DecodeRequest, DecoderSettings, DicomDecoder, SeriesOutcome};
pub use result::{DecodeOutput, DecodeResult, DecodeSource, ImagePayload, RenderedFrame};
pub use strategy::{FallthroughLog, Tier, TierOutcome};
