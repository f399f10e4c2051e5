//! Fallback chain tests.
//!
//! Tests verify:
//! - Native failures reach the external decoder exactly once
//! - External images are accepted inline or from the output file
//! - External failures degrade to passthrough of the original bytes
//! - Abort while the external decoder runs yields a failure
//! - A missing interpreter degrades instead of failing
//! - Real decoder scripts: exit codes, stdout contract, output file

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::TempPath;

use dicom_render::decode::{
    AbortSignal, DecodeRequest, DecodeResult, DecodeSource, DecoderSettings, DicomDecoder,
    ProcessDecoder, SeriesOutcome,
};
use dicom_render::deid::AnonymizationZones;
use dicom_render::dicom::{Tag, DICOM_MIME_TYPE};
use dicom_render::sampling::SeriesEntry;

use super::test_utils::{
    decode_rgb, image_header, multiframe, solid_png, truncated_image, DicomBuilder, Script,
    ScriptedDecoder, Syntax,
};

const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";

fn decoder(script: Script) -> (DicomDecoder<ScriptedDecoder>, ScriptedDecoder) {
    let external = ScriptedDecoder::new(script);
    let decoder = DicomDecoder::new(DecoderSettings::default(), external.clone()).unwrap();
    (decoder, external)
}

/// Defined-length pixel data declared under a compressed transfer syntax.
fn encapsulated_image() -> Vec<u8> {
    image_header(
        DicomBuilder::new(Syntax::ExplicitLittle).with_transfer_syntax_uid(JPEG_BASELINE),
        8,
        8,
        8,
    )
    .pixels_u8(&[0xAB; 64])
    .build()
}

// =============================================================================
// Passthrough
// =============================================================================

#[tokio::test]
async fn test_truncated_pixels_fall_through_to_passthrough() {
    let (decoder, external) = decoder(Script::Crash);
    let original = truncated_image();

    let result = decoder.decode(DecodeRequest::new(original.clone())).await;

    assert_eq!(external.calls(), 1);
    match result {
        DecodeResult::Degraded {
            reason,
            bytes,
            mime_type,
            metadata,
        } => {
            assert_eq!(&bytes[..], &original[..]);
            assert_eq!(mime_type, DICOM_MIME_TYPE);
            assert!(reason.contains("native"), "reason: {}", reason);
            assert!(reason.contains("external"), "reason: {}", reason);
            assert_eq!(metadata.unwrap().u32(Tag::ROWS), Some(64));
        }
        other => panic!("expected Degraded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reported_failure_degrades() {
    let (decoder, external) = decoder(Script::ReportFailure);
    let result = decoder.decode(DecodeRequest::new(truncated_image())).await;

    assert_eq!(external.calls(), 1);
    assert!(result.is_degraded());

    let json = serde_json::to_value(result.to_output()).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["images"][0]["mimeType"], DICOM_MIME_TYPE);
}

#[tokio::test]
async fn test_missing_interpreter_degrades() {
    let script = tempfile::NamedTempFile::new().unwrap();
    let external = ProcessDecoder::new(
        "dicom-render-no-such-interpreter",
        Some(script.path().to_path_buf()),
    );
    let decoder = DicomDecoder::new(DecoderSettings::default(), external).unwrap();

    let result = decoder.decode(DecodeRequest::new(truncated_image())).await;
    assert!(result.is_degraded(), "got {:?}", result);
    assert!(result.reason().unwrap().contains("external"));
}

#[tokio::test]
async fn test_unconfigured_external_degrades() {
    let decoder =
        DicomDecoder::new(DecoderSettings::default(), ProcessDecoder::disabled()).unwrap();
    let result = decoder.decode(DecodeRequest::new(encapsulated_image())).await;
    assert!(result.is_degraded());
}

// =============================================================================
// External success
// =============================================================================

#[tokio::test]
async fn test_compressed_syntax_uses_external_inline_image() {
    let (decoder, external) = decoder(Script::InlinePng(solid_png(32, 24, 200)));

    let result = decoder.decode(DecodeRequest::new(encapsulated_image())).await;

    assert_eq!(external.calls(), 1);
    let DecodeResult::Success { frames, source, .. } = &result else {
        panic!("expected Success, got {:?}", result);
    };
    assert_eq!(*source, DecodeSource::External);
    assert_eq!(frames.len(), 1);
    assert_eq!((frames[0].width, frames[0].height), (32, 24));
    assert_eq!(decode_rgb(&frames[0].data).get_pixel(16, 12).0, [200, 200, 200]);
}

#[tokio::test]
async fn test_external_image_read_from_output_file() {
    let (decoder, external) = decoder(Script::FilePng(solid_png(10, 10, 50)));

    let result = decoder.decode(DecodeRequest::new(truncated_image())).await;

    assert_eq!(external.calls(), 1);
    assert!(result.is_success(), "got {:?}", result);
    assert_eq!(result.frames()[0].width, 10);
}

#[tokio::test]
async fn test_unparseable_input_uses_external_metadata() {
    let (decoder, _) = decoder(Script::InlinePng(solid_png(4, 4, 10)));

    let result = decoder.decode(DecodeRequest::new(vec![0x42u8; 300])).await;

    assert!(result.is_success(), "got {:?}", result);
    let metadata = result.metadata().unwrap();
    assert_eq!(metadata.string(Tag::MODALITY), Some("MR"));
}

#[tokio::test]
async fn test_external_image_is_masked_when_anonymizing() {
    let (decoder, _) = decoder(Script::InlinePng(solid_png(100, 100, 255)));

    let request = DecodeRequest::new(encapsulated_image()).with_anonymize(true);
    let result = decoder.decode(request).await;

    let image = decode_rgb(&result.frames()[0].data);
    let zones = AnonymizationZones::default();
    for (x, y, pixel) in image.enumerate_pixels() {
        let expected = if zones.contains(x, y, 100, 100) { 0 } else { 255 };
        assert_eq!(pixel.0, [expected; 3], "pixel ({}, {})", x, y);
    }
}

// =============================================================================
// Abort
// =============================================================================

#[tokio::test]
async fn test_abort_during_external_fails() {
    let (decoder, external) = decoder(Script::WaitForAbort);
    let (handle, signal) = AbortSignal::pair();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
    });

    let request = DecodeRequest::new(truncated_image()).with_abort(signal);
    let result = tokio::time::timeout(Duration::from_secs(5), decoder.decode(request))
        .await
        .expect("abort should end the decode");

    assert_eq!(external.calls(), 1);
    match result {
        DecodeResult::Failure { reason } => assert!(reason.contains("abort")),
        other => panic!("expected Failure, got {:?}", other),
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_decode_pair_runs_both_series() {
    let (decoder, external) = decoder(Script::InlinePng(solid_png(4, 4, 0)));

    let first = vec![
        SeriesEntry::new("IM2.dcm", None, multiframe(2, 4, 4)),
        SeriesEntry::new("IM10.dcm", None, truncated_image()),
    ];
    let second = vec![SeriesEntry::new(
        "notes.png",
        Some("image/png".to_string()),
        solid_png(2, 2, 0),
    )];

    let (left, right) = decoder.decode_pair(&first, &second, false).await;

    match left {
        SeriesOutcome::Dicom { selected, results } => {
            assert_eq!(selected, vec![0, 1]);
            assert_eq!(results[0].frames().len(), 1);
            assert_eq!(
                results[1].frames()[0].width,
                4,
                "truncated entry should come from the external tier"
            );
        }
        other => panic!("expected Dicom, got {:?}", other),
    }
    assert!(matches!(right, SeriesOutcome::Generic { ref selected } if selected == &vec![0]));
    assert_eq!(external.calls(), 1);
}

// =============================================================================
// Real decoder scripts
// =============================================================================

fn write_temp(suffix: &str, contents: &[u8]) -> TempPath {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents).unwrap();
    file.into_temp_path()
}

fn script_decoder(interpreter: &str, script: &Path) -> DicomDecoder<ProcessDecoder> {
    let external = ProcessDecoder::new(interpreter, Some(script.to_path_buf()));
    DicomDecoder::new(DecoderSettings::default(), external).unwrap()
}

/// Script that checks its input, copies `png` to the output path and reports success.
fn copying_script(png: &Path) -> TempPath {
    let body = format!(
        "test -s \"$1\" || exit 9\ncp '{}' \"$2\"\necho '{{\"success\": true}}'\n",
        png.display()
    );
    write_temp(".sh", body.as_bytes())
}

#[tokio::test]
async fn test_script_non_zero_exit_degrades() {
    let script = write_temp(".sh", b"echo boom >&2\nexit 3\n");
    let decoder = script_decoder("bash", &script);
    let original = truncated_image();

    let result = decoder.decode(DecodeRequest::new(original.clone())).await;

    match result {
        DecodeResult::Degraded { reason, bytes, .. } => {
            assert!(reason.contains("Some(3)"), "reason: {}", reason);
            assert!(reason.contains("boom"), "reason: {}", reason);
            assert_eq!(&bytes[..], &original[..]);
        }
        other => panic!("expected Degraded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_script_non_json_stdout_degrades() {
    let script = write_temp(".sh", b"echo 'decoder crashed'\n");
    let decoder = script_decoder("bash", &script);

    let result = decoder.decode(DecodeRequest::new(truncated_image())).await;

    assert!(result.is_degraded(), "got {:?}", result);
    let reason = result.reason().unwrap();
    assert!(reason.contains("Malformed decoder output"), "reason: {}", reason);
}

#[tokio::test]
async fn test_script_image_read_from_output_path() {
    let png = write_temp(".png", &solid_png(12, 6, 90));
    let script = copying_script(&png);
    let decoder = script_decoder("bash", &script);

    let result = decoder.decode(DecodeRequest::new(truncated_image())).await;

    let DecodeResult::Success { frames, source, .. } = &result else {
        panic!("expected Success, got {:?}", result);
    };
    assert_eq!(*source, DecodeSource::External);
    assert_eq!((frames[0].width, frames[0].height), (12, 6));
    assert_eq!(decode_rgb(&frames[0].data).get_pixel(3, 3).0, [90, 90, 90]);
}

#[tokio::test]
async fn test_interpreter_rejecting_version_flag_runs_script() {
    // dash answers --version with a non-zero exit
    let png = write_temp(".png", &solid_png(4, 4, 30));
    let script = copying_script(&png);
    let decoder = script_decoder("sh", &script);

    let result = decoder.decode(DecodeRequest::new(truncated_image())).await;
    assert!(result.is_success(), "got {:?}", result);
}
