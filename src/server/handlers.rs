//! HTTP request handlers for the decode API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /decode?anonymize=bool` - Decode one raw DICOM body
//! - `POST /decode/series` - Decode a folder sent as JSON

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::decode::{
    DecodeOutput, DecodeRequest, DecodeResult, DicomDecoder, ExternalDecoder, ImagePayload,
    SeriesOutcome,
};
use crate::dicom::DicomSummary;
use crate::sampling::SeriesEntry;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the decoder.
pub struct AppState<E: ExternalDecoder> {
    pub decoder: Arc<DicomDecoder<E>>,
}

impl<E: ExternalDecoder> AppState<E> {
    pub fn new(decoder: DicomDecoder<E>) -> Self {
        Self {
            decoder: Arc::new(decoder),
        }
    }
}

impl<E: ExternalDecoder> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            decoder: Arc::clone(&self.decoder),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for `POST /decode`.
#[derive(Debug, Default, Deserialize)]
pub struct DecodeQueryParams {
    #[serde(default)]
    pub anonymize: bool,
}

/// One file of a series upload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesFile {
    pub name: String,

    #[serde(default)]
    pub mime_type: Option<String>,

    /// Base64 file content
    pub data: String,
}

/// Body of `POST /decode/series`.
#[derive(Debug, Deserialize)]
pub struct SeriesRequest {
    #[serde(default)]
    pub anonymize: bool,

    pub files: Vec<SeriesFile>,
}

impl SeriesRequest {
    fn into_entries(self) -> Result<Vec<SeriesEntry>, ApiError> {
        self.files
            .into_iter()
            .map(|file| {
                let data = BASE64.decode(file.data.trim()).map_err(|e| {
                    ApiError::InvalidRequest(format!("{}: data is not base64 ({})", file.name, e))
                })?;
                Ok(SeriesEntry::new(file.name, file.mime_type, data))
            })
            .collect()
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "empty_body", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response from `POST /decode/series`.
#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    /// "success", "degraded", "failure" or "generic"
    pub status: &'static str,

    pub images: Vec<ImagePayload>,

    pub metadata: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DicomSummary>,

    /// Indices into the uploaded file list
    pub selected: Vec<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SeriesResponse {
    pub fn from_outcome(outcome: SeriesOutcome) -> Self {
        match outcome {
            SeriesOutcome::Generic { selected } => Self {
                status: "generic",
                images: Vec::new(),
                metadata: String::new(),
                summary: None,
                selected,
                reason: None,
            },
            SeriesOutcome::Dicom { selected, results } => {
                let status = if results.iter().any(DecodeResult::is_success) {
                    "success"
                } else if results.iter().any(DecodeResult::is_degraded) {
                    "degraded"
                } else {
                    "failure"
                };

                let outputs: Vec<DecodeOutput> = results.iter().map(DecodeResult::to_output).collect();
                let first_with_metadata = outputs.iter().find(|o| o.summary.is_some());
                let metadata = first_with_metadata
                    .map(|o| o.metadata.clone())
                    .unwrap_or_default();
                let summary = first_with_metadata.and_then(|o| o.summary.clone());
                let reasons: Vec<String> = outputs.iter().filter_map(|o| o.reason.clone()).collect();

                Self {
                    status,
                    images: outputs.into_iter().flat_map(|o| o.images).collect(),
                    metadata,
                    summary,
                    selected,
                    reason: (!reasons.is_empty()).then(|| reasons.join(" | ")),
                }
            }
        }
    }
}

// =============================================================================
// Error Handling
// =============================================================================

/// Errors rejected before decoding starts.
#[derive(Debug)]
pub enum ApiError {
    EmptyBody,
    InvalidRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::EmptyBody => (
                StatusCode::BAD_REQUEST,
                "empty_body",
                "Request body is empty".to_string(),
            ),
            ApiError::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message)
            }
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check.
///
/// `GET /health` → `{"status": "healthy", "version": "0.1.0"}`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Decode one DICOM object sent as the raw request body.
///
/// # Endpoint
///
/// `POST /decode?anonymize=true`
///
/// # Response
///
/// `200 OK` with `{status, images: [{image, mimeType}], metadata, summary?, reason?}`.
/// Decode problems are reported through `status`, never as HTTP errors.
///
/// # Errors
///
/// - `400 Bad Request`: empty body
pub async fn decode_handler<E: ExternalDecoder + 'static>(
    State(state): State<AppState<E>>,
    Query(params): Query<DecodeQueryParams>,
    body: Bytes,
) -> Result<Json<DecodeOutput>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::EmptyBody);
    }

    debug!(
        bytes = body.len(),
        anonymize = params.anonymize,
        "Decode request"
    );

    let request = DecodeRequest::new(body).with_anonymize(params.anonymize);
    let result = state.decoder.decode(request).await;
    Ok(Json(result.to_output()))
}

/// Decode a folder of files sent as JSON.
///
/// # Endpoint
///
/// `POST /decode/series`
///
/// ```json
/// { "anonymize": true, "files": [{ "name": "IM1.dcm", "mimeType": "", "data": "<base64>" }] }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: no files, or a file whose data is not base64
pub async fn series_handler<E: ExternalDecoder + 'static>(
    State(state): State<AppState<E>>,
    Json(request): Json<SeriesRequest>,
) -> Result<Json<SeriesResponse>, ApiError> {
    if request.files.is_empty() {
        return Err(ApiError::InvalidRequest("files must not be empty".to_string()));
    }

    let anonymize = request.anonymize;
    let entries = request.into_entries()?;
    debug!(files = entries.len(), anonymize, "Series decode request");

    let outcome = state.decoder.decode_series(&entries, anonymize).await;
    Ok(Json(SeriesResponse::from_outcome(outcome)))
}
