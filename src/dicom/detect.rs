//! Input classification.
//!
//! Decides whether an uploaded file should go through the DICOM pipeline,
//! using the file name, the declared MIME type and, when the MIME type is
//! empty, a sniff of the first bytes.
//!
//! Browsers report an empty MIME type for `.dcm` files and for the
//! extension-less `IM0001`-style names that scanners write into DICOMDIR
//! folders, so an empty MIME type is treated as "probably DICOM" and confirmed
//! by the sniff.

use super::parser::{has_preamble, DICM_MAGIC};
use super::tags::Vr;

/// MIME type used for DICOM content and for raw passthrough output.
pub const DICOM_MIME_TYPE: &str = "application/dicom";

/// File extensions recognised as DICOM.
const DICOM_EXTENSIONS: &[&str] = &["dcm", "dicom"];

/// Extensions recognised as ordinary images when a folder holds no DICOM.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

/// Extensions recognised as video when a folder holds no DICOM.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv", "m4v"];

// =============================================================================
// InputKind
// =============================================================================

/// What an uploaded file looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Dicom,
    Image,
    Video,
    Other,
}

impl InputKind {
    pub const fn name(&self) -> &'static str {
        match self {
            InputKind::Dicom => "DICOM",
            InputKind::Image => "image",
            InputKind::Video => "video",
            InputKind::Other => "other",
        }
    }

    /// Whether the kind is handled by the generic (non-DICOM) media path.
    pub const fn is_generic_media(&self) -> bool {
        matches!(self, InputKind::Image | InputKind::Video)
    }
}

/// Classify a file by name, MIME type and content.
pub fn classify(name: &str, mime_type: Option<&str>, bytes: &[u8]) -> InputKind {
    let extension = extension(name);
    let mime = mime_type.map(str::trim).unwrap_or("").to_ascii_lowercase();

    if mime == DICOM_MIME_TYPE {
        return InputKind::Dicom;
    }
    if let Some(ext) = extension.as_deref() {
        if DICOM_EXTENSIONS.contains(&ext) {
            return InputKind::Dicom;
        }
    }
    if mime.is_empty() && is_dicom_bytes(bytes) {
        return InputKind::Dicom;
    }

    if mime.starts_with("image/") {
        return InputKind::Image;
    }
    if mime.starts_with("video/") {
        return InputKind::Video;
    }
    match extension.as_deref() {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => InputKind::Image,
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => InputKind::Video,
        _ => InputKind::Other,
    }
}

/// Quick structural sniff for DICOM content.
///
/// Accepts a Part-10 preamble + `DICM`, or a stream that begins with an
/// explicit-VR file meta element.
pub fn is_dicom_bytes(bytes: &[u8]) -> bool {
    if has_preamble(bytes) {
        return true;
    }
    if bytes.len() >= 8 && bytes[0] == 0x02 && bytes[1] == 0x00 {
        return Vr::from_bytes([bytes[4], bytes[5]]).is_some();
    }
    // A leading "DICM" marker means the preamble was stripped
    bytes.len() >= DICM_MAGIC.len() && &bytes[..DICM_MAGIC.len()] == DICM_MAGIC
}

fn extension(name: &str) -> Option<String> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

// =============================================================================
// Tests
// =============================================================================
