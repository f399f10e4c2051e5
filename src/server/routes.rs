//! Router configuration for the decode API.
//!
//! # Routes
//!
//! - `GET /health` - Health check
//! - `POST /decode` - Decode one object
//! - `POST /decode/series` - Decode a folder
//!
//! # Example
//!
//! ```ignore
//! use dicom_render::decode::{DecoderSettings, DicomDecoder, ProcessDecoder};
//! use dicom_render::server::{create_router, RouterConfig};
//!
//! let decoder = DicomDecoder::new(DecoderSettings::default(), ProcessDecoder::disabled())?;
//! let router = create_router(decoder, RouterConfig::new());
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{decode_handler, health_handler, series_handler, AppState};
use crate::decode::{DicomDecoder, ExternalDecoder};

/// Largest accepted request body (256 MiB).
pub const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Request body limit in bytes
    pub max_body_bytes: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self {
            cors_origins: None, // Allow any origin by default
            enable_tracing: true,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Create the axum router.
pub fn create_router<E>(decoder: DicomDecoder<E>, config: RouterConfig) -> Router
where
    E: ExternalDecoder + 'static,
{
    let app_state = AppState::new(decoder);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/decode", post(decode_handler::<E>))
        .route("/decode/series", post(series_handler::<E>))
        .with_state(app_state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => {
            // Empty list means no CORS (same-origin only)
            cors
        }
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
