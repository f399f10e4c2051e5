//! HTTP server layer.
//!
//! A thin boundary over [`DicomDecoder`](crate::decode::DicomDecoder): raw
//! DICOM bodies or JSON folder uploads in, base64 images plus metadata text
//! out.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      POST /decode            POST /decode/series                │
//! │                                                                 │
//! │  ┌─────────────────────┐        ┌─────────────────────────────┐ │
//! │  │      handlers       │        │           routes            │ │
//! │  │ (requests, errors)  │        │ (CORS, body limit, tracing) │ │
//! │  └─────────────────────┘        └─────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    decode_handler, health_handler, series_handler, ApiError, AppState, DecodeQueryParams,
    ErrorResponse, HealthResponse, SeriesFile, SeriesRequest, SeriesResponse,
};
pub use routes::{create_router, RouterConfig, MAX_BODY_BYTES};
