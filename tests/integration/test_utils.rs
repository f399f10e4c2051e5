//! Test utilities for integration tests.
//!
//! This module provides a builder for synthetic DICOM Part-10 objects and a
//! scripted external decoder that counts its invocations.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dicom_render::decode::{AbortSignal, ExternalDecoder, ExternalOutput};
use dicom_render::dicom::{
    Tag, Vr, DICM_MAGIC, EXPLICIT_VR_BIG_ENDIAN, EXPLICIT_VR_LITTLE_ENDIAN,
    IMPLICIT_VR_LITTLE_ENDIAN, PREAMBLE_SIZE,
};
use dicom_render::error::SubprocessError;

// =============================================================================
// Synthetic DICOM builder
// =============================================================================

/// Body encoding of a synthetic object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    ImplicitLittle,
    ExplicitLittle,
    ExplicitBig,
}

impl Syntax {
    fn uid(self) -> &'static str {
        match self {
            Syntax::ImplicitLittle => IMPLICIT_VR_LITTLE_ENDIAN,
            Syntax::ExplicitLittle => EXPLICIT_VR_LITTLE_ENDIAN,
            Syntax::ExplicitBig => EXPLICIT_VR_BIG_ENDIAN,
        }
    }

    fn big_endian(self) -> bool {
        self == Syntax::ExplicitBig
    }
}

/// Builds a Part-10 byte stream element by element.
///
/// Elements must be added in ascending tag order, as a real writer would.
pub struct DicomBuilder {
    syntax: Syntax,
    transfer_syntax_uid: String,
    body: Vec<u8>,
}

impl DicomBuilder {
    pub fn new(syntax: Syntax) -> Self {
        Self {
            syntax,
            transfer_syntax_uid: syntax.uid().to_string(),
            body: Vec::new(),
        }
    }

    /// Declare a different transfer syntax UID while keeping the body layout.
    pub fn with_transfer_syntax_uid(mut self, uid: &str) -> Self {
        self.transfer_syntax_uid = uid.to_string();
        self
    }

    fn u16_bytes(&self, value: u16) -> [u8; 2] {
        if self.syntax.big_endian() {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn u32_bytes(&self, value: u32) -> [u8; 4] {
        if self.syntax.big_endian() {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    /// Append one element with an explicit VR (ignored for implicit syntax).
    pub fn element(mut self, tag: Tag, vr: &[u8; 2], value: &[u8]) -> Self {
        let group = self.u16_bytes(tag.group);
        let element = self.u16_bytes(tag.element);
        self.body.extend_from_slice(&group);
        self.body.extend_from_slice(&element);

        if self.syntax == Syntax::ImplicitLittle {
            let len = self.u32_bytes(value.len() as u32);
            self.body.extend_from_slice(&len);
        } else {
            self.body.extend_from_slice(vr);
            let long = Vr::from_bytes(*vr).is_some_and(Vr::has_long_length);
            if long {
                let len = self.u32_bytes(value.len() as u32);
                self.body.extend_from_slice(&[0, 0]);
                self.body.extend_from_slice(&len);
            } else {
                let len = self.u16_bytes(value.len() as u16);
                self.body.extend_from_slice(&len);
            }
        }

        self.body.extend_from_slice(value);
        self
    }

    /// Append a US element.
    pub fn us(self, tag: Tag, value: u16) -> Self {
        let bytes = self.u16_bytes(value);
        self.element(tag, b"US", &bytes)
    }

    /// Append a text element, padded to even length with a space.
    pub fn text(self, tag: Tag, vr: &[u8; 2], value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(b' ');
        }
        self.element(tag, vr, &bytes)
    }

    /// Append Pixel Data holding 16-bit samples in the body byte order.
    pub fn pixels_u16(self, samples: &[u16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            bytes.extend_from_slice(&self.u16_bytes(sample));
        }
        self.element(Tag::PIXEL_DATA, b"OW", &bytes)
    }

    /// Append Pixel Data holding 8-bit samples.
    pub fn pixels_u8(self, samples: &[u8]) -> Self {
        let mut bytes = samples.to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(0);
        }
        self.element(Tag::PIXEL_DATA, b"OB", &bytes)
    }

    /// Append a Pixel Data header that declares `declared` bytes but carries
    /// only `present`.
    pub fn truncated_pixels(mut self, declared: u32, present: usize) -> Self {
        let group = self.u16_bytes(Tag::PIXEL_DATA.group);
        let element = self.u16_bytes(Tag::PIXEL_DATA.element);
        self.body.extend_from_slice(&group);
        self.body.extend_from_slice(&element);
        if self.syntax != Syntax::ImplicitLittle {
            self.body.extend_from_slice(b"OW");
            self.body.extend_from_slice(&[0, 0]);
        }
        let len = self.u32_bytes(declared);
        self.body.extend_from_slice(&len);
        self.body.extend(std::iter::repeat(0x11).take(present));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = vec![0u8; PREAMBLE_SIZE];
        out.extend_from_slice(DICM_MAGIC);

        // Meta group is always Explicit VR Little Endian
        let mut uid = self.transfer_syntax_uid.as_bytes().to_vec();
        if uid.len() % 2 == 1 {
            uid.push(0);
        }
        out.extend_from_slice(&Tag::TRANSFER_SYNTAX_UID.group.to_le_bytes());
        out.extend_from_slice(&Tag::TRANSFER_SYNTAX_UID.element.to_le_bytes());
        out.extend_from_slice(b"UI");
        out.extend_from_slice(&(uid.len() as u16).to_le_bytes());
        out.extend_from_slice(&uid);

        out.extend_from_slice(&self.body);
        out
    }
}

/// Standard image description elements, up to (not including) windowing.
pub fn image_header(builder: DicomBuilder, rows: u16, cols: u16, bits: u16) -> DicomBuilder {
    builder
        .us(Tag::SAMPLES_PER_PIXEL, 1)
        .text(Tag::PHOTOMETRIC_INTERPRETATION, b"CS", "MONOCHROME2")
        .us(Tag::ROWS, rows)
        .us(Tag::COLUMNS, cols)
        .us(Tag::BITS_ALLOCATED, bits)
        .us(Tag::BITS_STORED, bits)
        .us(Tag::PIXEL_REPRESENTATION, 0)
}

/// A 100×100 16-bit image whose values run uniformly from 0 (top-left) to
/// 1000 (bottom-right), without window tags.
pub fn gradient_100(syntax: Syntax) -> Vec<u8> {
    let samples: Vec<u16> = (0..10_000u32).map(|i| (i * 1000 / 9999) as u16).collect();
    image_header(DicomBuilder::new(syntax), 100, 100, 16)
        .pixels_u16(&samples)
        .build()
}

/// A single-frame 16-bit image with identifying tags and a window that maps
/// `value` to a fixed gray level.
pub fn identified_image(rows: u16, cols: u16, value: u16) -> Vec<u8> {
    let samples = vec![value; rows as usize * cols as usize];
    DicomBuilder::new(Syntax::ExplicitLittle)
        .text(Tag::STUDY_DATE, b"DA", "20240131")
        .text(Tag::MODALITY, b"CS", "CT")
        .text(Tag::INSTITUTION_NAME, b"LO", "General Hospital")
        .text(Tag::PATIENT_NAME, b"PN", "Doe^Jane")
        .text(Tag::PATIENT_ID, b"LO", "MRN-123456")
        .text(Tag::PATIENT_BIRTH_DATE, b"DA", "19700101")
        .us(Tag::SAMPLES_PER_PIXEL, 1)
        .text(Tag::PHOTOMETRIC_INTERPRETATION, b"CS", "MONOCHROME2")
        .us(Tag::ROWS, rows)
        .us(Tag::COLUMNS, cols)
        .us(Tag::BITS_ALLOCATED, 16)
        .us(Tag::BITS_STORED, 16)
        .us(Tag::PIXEL_REPRESENTATION, 0)
        .text(Tag::WINDOW_CENTER, b"DS", "500")
        .text(Tag::WINDOW_WIDTH, b"DS", "1000")
        .pixels_u16(&samples)
        .build()
}

/// A multi-frame 8-bit object; frame `i` is filled with the value `i`.
pub fn multiframe(frames: u16, rows: u16, cols: u16) -> Vec<u8> {
    let per_frame = rows as usize * cols as usize;
    let mut samples = Vec::with_capacity(per_frame * frames as usize);
    for frame in 0..frames {
        samples.extend(std::iter::repeat(frame as u8).take(per_frame));
    }
    DicomBuilder::new(Syntax::ExplicitLittle)
        .us(Tag::SAMPLES_PER_PIXEL, 1)
        .text(Tag::PHOTOMETRIC_INTERPRETATION, b"CS", "MONOCHROME2")
        .text(Tag::NUMBER_OF_FRAMES, b"IS", &frames.to_string())
        .us(Tag::ROWS, rows)
        .us(Tag::COLUMNS, cols)
        .us(Tag::BITS_ALLOCATED, 8)
        .us(Tag::BITS_STORED, 8)
        .us(Tag::PIXEL_REPRESENTATION, 0)
        .text(Tag::WINDOW_CENTER, b"DS", "128")
        .text(Tag::WINDOW_WIDTH, b"DS", "256")
        .pixels_u8(&samples)
        .build()
}

/// A 16-bit image header whose pixel data is cut short.
pub fn truncated_image() -> Vec<u8> {
    image_header(DicomBuilder::new(Syntax::ExplicitLittle), 64, 64, 16)
        .truncated_pixels(64 * 64 * 2, 100)
        .build()
}

// =============================================================================
// Image helpers
// =============================================================================

/// Decode an encoded frame back into RGB.
pub fn decode_rgb(data: &[u8]) -> RgbImage {
    image::load_from_memory(data)
        .expect("frame should decode")
        .to_rgb8()
}

/// Encode a solid RGB image as PNG.
pub fn solid_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, image::Rgb([value, value, value]));
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .expect("png encode");
    out
}

/// Check if data is a valid PNG (starts with the PNG signature).
pub fn is_valid_png(data: &[u8]) -> bool {
    data.len() >= 8 && data[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
}

/// Check if data is a valid JPEG (starts with SOI marker).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

// =============================================================================
// Scripted external decoder
// =============================================================================

/// What the scripted decoder does when invoked.
#[derive(Clone)]
pub enum Script {
    /// Report success with a base64 PNG in the JSON output
    InlinePng(Vec<u8>),

    /// Write a PNG to the output path and report success without an image
    FilePng(Vec<u8>),

    /// Report `success: false`
    ReportFailure,

    /// Fail as if the process exited non-zero
    Crash,

    /// Wait for the abort signal
    WaitForAbort,
}

/// An [`ExternalDecoder`] that follows a fixed script and counts calls.
#[derive(Clone)]
pub struct ScriptedDecoder {
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared counter, readable after the decoder moves into a router.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ExternalDecoder for ScriptedDecoder {
    async fn invoke(
        &self,
        input: &Path,
        output: &Path,
        abort: Option<AbortSignal>,
    ) -> Result<ExternalOutput, SubprocessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(input.exists(), "input scratch file must exist during invoke");

        match &self.script {
            Script::InlinePng(png) => {
                let stdout = format!(
                    "loading pixel handlers\n{{\"success\": true, \"image\": \"{}\", \"metadata\": {{\"Modality\": \"MR\"}}}}",
                    BASE64.encode(png)
                );
                ExternalOutput::parse(stdout.as_bytes())
            }
            Script::FilePng(png) => {
                tokio::fs::write(output, png)
                    .await
                    .expect("write scratch output");
                ExternalOutput::parse(br#"{"success": true}"#)
            }
            Script::ReportFailure => ExternalOutput::parse(br#"{"success": false}"#),
            Script::Crash => Err(SubprocessError::NonZeroExit {
                code: Some(1),
                stderr: "Traceback: decoder crashed".to_string(),
            }),
            Script::WaitForAbort => {
                let mut signal = abort.expect("abort signal expected");
                signal.aborted().await;
                Err(SubprocessError::Aborted)
            }
        }
    }
}
