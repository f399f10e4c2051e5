//! API integration tests for the decode endpoints.
//!
//! Tests verify:
//! - Health check
//! - Single-object decode, with and without anonymization
//! - Series decode from a JSON upload
//! - HTTP response codes for malformed requests

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use dicom_render::decode::{DecoderSettings, DicomDecoder};
use dicom_render::{create_router, RouterConfig};

use super::test_utils::{
    decode_rgb, gradient_100, identified_image, multiframe, solid_png, truncated_image, Script,
    ScriptedDecoder, Syntax,
};

fn router() -> axum::Router {
    let decoder =
        DicomDecoder::new(DecoderSettings::default(), ScriptedDecoder::new(Script::Crash))
            .unwrap();
    create_router(decoder, RouterConfig::new().with_tracing(false))
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn decode_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/dicom")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// POST /decode
// =============================================================================

#[tokio::test]
async fn test_decode_success() {
    let response = router()
        .oneshot(decode_request(
            "/decode",
            gradient_100(Syntax::ExplicitLittle),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["images"][0]["mimeType"], "image/png");
    assert_eq!(json["summary"]["rows"], 100);
    assert!(json["metadata"]
        .as_str()
        .unwrap()
        .starts_with("Modality: Unknown"));

    let png = BASE64
        .decode(json["images"][0]["image"].as_str().unwrap())
        .unwrap();
    assert_eq!(decode_rgb(&png).dimensions(), (100, 100));
}

#[tokio::test]
async fn test_decode_anonymized_masks_borders() {
    let response = router()
        .oneshot(decode_request(
            "/decode?anonymize=true",
            identified_image(50, 50, 1000),
        ))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["status"], "success");

    let png = BASE64
        .decode(json["images"][0]["image"].as_str().unwrap())
        .unwrap();
    let image = decode_rgb(&png);
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
    assert_eq!(image.get_pixel(25, 25).0, [255, 255, 255]);
}

#[tokio::test]
async fn test_decode_degraded_is_still_200() {
    let response = router()
        .oneshot(decode_request("/decode", truncated_image()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["images"][0]["mimeType"], "application/dicom");
    assert!(json["reason"].as_str().unwrap().contains("native"));
}

#[tokio::test]
async fn test_decode_empty_body_is_bad_request() {
    let response = router()
        .oneshot(decode_request("/decode", Vec::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], "empty_body");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_decode_body_limit() {
    let decoder =
        DicomDecoder::new(DecoderSettings::default(), ScriptedDecoder::new(Script::Crash))
            .unwrap();
    let router = create_router(
        decoder,
        RouterConfig::new().with_tracing(false).with_max_body_bytes(64),
    );

    let response = router
        .oneshot(decode_request("/decode", vec![0u8; 1024]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// =============================================================================
// POST /decode/series
// =============================================================================

fn series_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/decode/series")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_series_decode() {
    let body = serde_json::json!({
        "anonymize": false,
        "files": [
            { "name": "IM10.dcm", "data": BASE64.encode(multiframe(1, 4, 4)) },
            { "name": "IM2.dcm", "data": BASE64.encode(multiframe(1, 4, 4)) },
            { "name": "readme.txt", "mimeType": "text/plain", "data": BASE64.encode(b"hi") },
        ]
    });

    let response = router().oneshot(series_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["selected"], serde_json::json!([1, 0]));
    assert_eq!(json["images"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_series_without_dicom_is_generic() {
    let body = serde_json::json!({
        "files": [
            { "name": "photo.png", "mimeType": "image/png", "data": BASE64.encode(solid_png(2, 2, 9)) },
        ]
    });

    let response = router().oneshot(series_request(body)).await.unwrap();
    let json = json_body(response).await;
    assert_eq!(json["status"], "generic");
    assert_eq!(json["selected"], serde_json::json!([0]));
}

#[tokio::test]
async fn test_series_empty_files_is_bad_request() {
    let response = router()
        .oneshot(series_request(serde_json::json!({ "files": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_series_bad_base64_is_bad_request() {
    let body = serde_json::json!({
        "files": [{ "name": "IM1.dcm", "data": "not base64!" }]
    });
    let response = router().oneshot(series_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_request");
}
