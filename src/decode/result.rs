//! Decode results and their JSON form.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;

use crate::dicom::{metadata_text, DicomSummary, TagTable};

// =============================================================================
// RenderedFrame
// =============================================================================

/// One encoded frame. Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
    pub mime_type: &'static str,

    /// Position on the frame axis this image was taken from
    pub frame_index: usize,
}

// =============================================================================
// DecodeResult
// =============================================================================

/// Where a successful render came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeSource {
    Native,
    External,
}

/// Terminal outcome of one decode call.
#[derive(Debug, Clone)]
pub enum DecodeResult {
    /// At least one frame rendered
    Success {
        frames: Vec<RenderedFrame>,
        metadata: TagTable,
        source: DecodeSource,
    },

    /// Nothing could be rendered; `bytes` is the (possibly scrubbed) input,
    /// unverified
    Degraded {
        reason: String,
        bytes: Bytes,
        mime_type: &'static str,
        metadata: Option<TagTable>,
    },

    /// Nothing to return at all
    Failure { reason: String },
}

impl DecodeResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        DecodeResult::Failure {
            reason: reason.into(),
        }
    }

    pub const fn status(&self) -> &'static str {
        match self {
            DecodeResult::Success { .. } => "success",
            DecodeResult::Degraded { .. } => "degraded",
            DecodeResult::Failure { .. } => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DecodeResult::Success { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, DecodeResult::Degraded { .. })
    }

    pub fn frames(&self) -> &[RenderedFrame] {
        match self {
            DecodeResult::Success { frames, .. } => frames,
            _ => &[],
        }
    }

    pub fn metadata(&self) -> Option<&TagTable> {
        match self {
            DecodeResult::Success { metadata, .. } => Some(metadata),
            DecodeResult::Degraded { metadata, .. } => metadata.as_ref(),
            DecodeResult::Failure { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DecodeResult::Success { .. } => None,
            DecodeResult::Degraded { reason, .. } | DecodeResult::Failure { reason } => {
                Some(reason)
            }
        }
    }

    /// Convert to the JSON shape returned by the CLI and HTTP surface.
    pub fn to_output(&self) -> DecodeOutput {
        let images = match self {
            DecodeResult::Success { frames, .. } => frames
                .iter()
                .map(|frame| ImagePayload::new(&frame.data, frame.mime_type))
                .collect(),
            DecodeResult::Degraded {
                bytes, mime_type, ..
            } => vec![ImagePayload::new(bytes, mime_type)],
            DecodeResult::Failure { .. } => Vec::new(),
        };

        let metadata = self.metadata();
        DecodeOutput {
            status: self.status(),
            images,
            metadata: metadata.map(metadata_text).unwrap_or_default(),
            summary: metadata.map(DicomSummary::from_table),
            reason: self.reason().map(str::to_string),
        }
    }
}

// =============================================================================
// JSON output
// =============================================================================

/// Base64 image with its MIME type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub image: String,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(data: &[u8], mime_type: &str) -> Self {
        Self {
            image: BASE64.encode(data),
            mime_type: mime_type.to_string(),
        }
    }
}

/// Serialized decode result.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeOutput {
    pub status: &'static str,
    pub images: Vec<ImagePayload>,

    /// Prompt text block; empty when no tags could be read
    pub metadata: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DicomSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
