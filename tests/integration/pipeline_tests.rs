//! End-to-end decode tests through the native tier.
//!
//! Tests verify:
//! - Windowing derived from the data range
//! - Frame sampling for multi-frame objects
//! - Each natively supported transfer syntax
//! - JPEG output and metadata text

use dicom_render::decode::{
    DecodeRequest, DecodeResult, DecodeSource, DecoderSettings, DicomDecoder, SeriesOutcome,
};
use dicom_render::pixel::OutputFormat;
use dicom_render::sampling::SeriesEntry;

use super::test_utils::{
    decode_rgb, gradient_100, is_valid_jpeg, is_valid_png, multiframe, Script, ScriptedDecoder,
    Syntax,
};

fn decoder(settings: DecoderSettings) -> DicomDecoder<ScriptedDecoder> {
    DicomDecoder::new(settings, ScriptedDecoder::new(Script::Crash)).unwrap()
}

// =============================================================================
// Windowing
// =============================================================================

#[tokio::test]
async fn test_gradient_windowed_from_data_range() {
    let decoder = decoder(DecoderSettings::default());
    let result = decoder
        .decode(DecodeRequest::new(gradient_100(Syntax::ExplicitLittle)))
        .await;

    let DecodeResult::Success {
        frames,
        metadata,
        source,
    } = result
    else {
        panic!("expected Success, got {:?}", result);
    };

    assert_eq!(source, DecodeSource::Native);
    assert_eq!(frames.len(), 1);
    assert_eq!((frames[0].width, frames[0].height), (100, 100));
    assert_eq!(frames[0].mime_type, "image/png");
    assert!(is_valid_png(&frames[0].data));
    assert!(!metadata.is_empty());

    // Window derived as center 500, width 1000
    let image = decode_rgb(&frames[0].data);
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
    assert_eq!(image.get_pixel(99, 99).0, [255, 255, 255]);

    // Value 500 sits in the middle of the ramp
    let mid = image.get_pixel(99, 49).0[0];
    assert!((120..=135).contains(&mid), "mid gray was {}", mid);
}

#[tokio::test]
async fn test_gradient_is_monotonic() {
    let decoder = decoder(DecoderSettings::default());
    let result = decoder
        .decode(DecodeRequest::new(gradient_100(Syntax::ExplicitLittle)))
        .await;
    let image = decode_rgb(&result.frames()[0].data);

    let mut previous = 0u8;
    for y in 0..100 {
        for x in 0..100 {
            let gray = image.get_pixel(x, y).0[0];
            assert!(gray >= previous, "ramp decreased at ({}, {})", x, y);
            previous = gray;
        }
    }
}

// =============================================================================
// Transfer syntaxes
// =============================================================================

#[tokio::test]
async fn test_all_native_syntaxes_render_identically() {
    let decoder = decoder(DecoderSettings::default());

    let mut images = Vec::new();
    for syntax in [
        Syntax::ImplicitLittle,
        Syntax::ExplicitLittle,
        Syntax::ExplicitBig,
    ] {
        let result = decoder.decode(DecodeRequest::new(gradient_100(syntax))).await;
        assert!(result.is_success(), "{:?} failed: {:?}", syntax, result.reason());
        images.push(decode_rgb(&result.frames()[0].data));
    }

    assert_eq!(images[0], images[1]);
    assert_eq!(images[1], images[2]);
}

// =============================================================================
// Multi-frame sampling
// =============================================================================

#[tokio::test]
async fn test_thirty_frames_sampled_to_twelve() {
    let decoder = decoder(DecoderSettings::default());
    let result = decoder.decode(DecodeRequest::new(multiframe(30, 8, 8))).await;

    let indices: Vec<usize> = result.frames().iter().map(|f| f.frame_index).collect();
    assert_eq!(indices, vec![0, 2, 5, 7, 10, 12, 15, 17, 20, 22, 25, 27]);

    // Frame i is filled with i; window 128/256 maps it to floor(i * 255 / 256)
    for frame in result.frames() {
        let image = decode_rgb(&frame.data);
        let expected = (frame.frame_index as f64 * 255.0 / 256.0) as u8;
        assert_eq!(image.get_pixel(4, 4).0[0], expected);
    }
}

#[tokio::test]
async fn test_frame_count_below_cap_keeps_every_frame() {
    let decoder = decoder(DecoderSettings::default());
    let result = decoder.decode(DecodeRequest::new(multiframe(5, 4, 4))).await;

    let indices: Vec<usize> = result.frames().iter().map(|f| f.frame_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_custom_frame_cap() {
    let decoder = decoder(DecoderSettings {
        max_frames: 3,
        ..Default::default()
    });
    let result = decoder.decode(DecodeRequest::new(multiframe(30, 4, 4))).await;

    let indices: Vec<usize> = result.frames().iter().map(|f| f.frame_index).collect();
    assert_eq!(indices, vec![0, 10, 20]);
}

// =============================================================================
// Output format and JSON shape
// =============================================================================

#[tokio::test]
async fn test_jpeg_output() {
    let decoder = decoder(DecoderSettings {
        output_format: OutputFormat::jpeg(90),
        ..Default::default()
    });
    let result = decoder
        .decode(DecodeRequest::new(gradient_100(Syntax::ExplicitLittle)))
        .await;

    let frame = &result.frames()[0];
    assert_eq!(frame.mime_type, "image/jpeg");
    assert!(is_valid_jpeg(&frame.data));

    let image = decode_rgb(&frame.data);
    assert_eq!(image.dimensions(), (100, 100));
    assert!(image.get_pixel(0, 0).0[0] < 10);
    assert!(image.get_pixel(99, 99).0[0] > 245);
}

#[tokio::test]
async fn test_output_json_shape() {
    let decoder = decoder(DecoderSettings::default());
    let result = decoder
        .decode(DecodeRequest::new(gradient_100(Syntax::ExplicitLittle)))
        .await;

    let json = serde_json::to_value(result.to_output()).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["images"].as_array().unwrap().len(), 1);
    assert_eq!(json["images"][0]["mimeType"], "image/png");
    assert!(json["images"][0]["image"].as_str().unwrap().len() > 10);
    assert!(json["metadata"].as_str().unwrap().contains("Modality"));
    assert!(json.get("reason").is_none());
}

#[tokio::test]
async fn test_native_success_never_invokes_external() {
    let external = ScriptedDecoder::new(Script::Crash);
    let counter = external.counter();
    let decoder = DicomDecoder::new(DecoderSettings::default(), external).unwrap();

    let result = decoder
        .decode(DecodeRequest::new(gradient_100(Syntax::ExplicitLittle)))
        .await;
    assert!(result.is_success());
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
}

// =============================================================================
// Series
// =============================================================================

#[tokio::test]
async fn test_series_of_multiframe_files_renders_one_frame_per_file() {
    let decoder = decoder(DecoderSettings::default());
    let entries: Vec<SeriesEntry> = (1..=30)
        .map(|i| SeriesEntry::new(format!("IM{}.dcm", i), None, multiframe(30, 8, 8)))
        .collect();

    let SeriesOutcome::Dicom { selected, results } = decoder.decode_series(&entries, false).await
    else {
        panic!("expected a DICOM series");
    };

    assert_eq!(selected.len(), 12);
    assert_eq!(results.len(), 12);
    let rendered: usize = results.iter().map(|r| r.frames().len()).sum();
    assert_eq!(rendered, 12);
    assert!(results
        .iter()
        .all(|r| r.is_success() && r.frames()[0].frame_index == 0));
}

#[tokio::test]
async fn test_request_frame_cap_overrides_settings() {
    let decoder = decoder(DecoderSettings::default());
    let request = DecodeRequest::new(multiframe(30, 4, 4)).with_max_frames(2);
    let result = decoder.decode(request).await;

    let indices: Vec<usize> = result.frames().iter().map(|f| f.frame_index).collect();
    assert_eq!(indices, vec![0, 15]);
}
