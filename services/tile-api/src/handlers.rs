//! HTTP request handlers for document, tile, and monitoring endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query, RawQuery},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, instrument};

use overlay_protocol::{
    classify_image_source, expand, render_document, ImageReference, RawParams, TileRequest,
};
use tile_common::{TileAddress, TileError};
use tile_pyramid::TileGridTable;

use crate::compositor::placeholder_png;
use crate::state::AppState;

// ============================================================================
// Response Helpers
// ============================================================================

fn xml_response(body: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/xml")
        .body(body.into())
        .unwrap()
}

fn png_response(bytes: bytes::Bytes) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .body(bytes.into())
        .unwrap()
}

fn error_response(error: &TileError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, error.to_string()).into_response()
}

fn overloaded() -> Response {
    counter!("rejected_requests_total").increment(1);
    error_response(&TileError::ServiceUnavailable(
        "request queue full".to_string(),
    ))
}

// ============================================================================
// Document Endpoint
// ============================================================================

/// GET / - one level of the LOD tree as a KML document.
#[instrument(skip(state, params))]
pub async fn document_handler(
    Extension(state): Extension<Arc<AppState>>,
    RawQuery(raw): RawQuery,
    Query(params): Query<RawParams>,
) -> Response {
    let Ok(_permit) = state.limiter.try_acquire() else {
        return overloaded();
    };
    counter!("document_requests_total").increment(1);

    // A bare request carries no source to describe.
    if raw.as_deref().map_or(true, str::is_empty) {
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html")
            .body(String::new().into())
            .unwrap();
    }

    let request = TileRequest::from_params(&params);
    let grid = TileGridTable::build(request.config.profile, &request.config.bounds);
    let node = expand(request.address, &request.config, &grid);

    let image_href = match &node.address {
        None => None,
        Some(address) => {
            let reference = classify_image_source(
                address,
                &request.config,
                &state.endpoints,
                state.picker.as_ref(),
                state.prober.as_ref(),
            )
            .await;
            if matches!(reference, ImageReference::Placeholder(_)) {
                counter!("placeholder_references_total").increment(1);
            }
            Some(reference.href().to_string())
        }
    };

    let kml = render_document(
        &node,
        image_href.as_deref(),
        &request.config,
        &state.endpoints,
    );
    xml_response(kml)
}

// ============================================================================
// Tile Endpoint
// ============================================================================

/// GET /tiles - dynamically composited tile bytes.
#[instrument(skip(state, params))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<RawParams>,
) -> Response {
    let Ok(_permit) = state.limiter.try_acquire() else {
        return overloaded();
    };
    counter!("tile_requests_total").increment(1);

    let request = TileRequest::from_params(&params);
    let address = request.address.unwrap_or(TileAddress { z: 0, x: 0, y: 0 });

    match state.compositor.resolve(&address, &request.config).await {
        Ok(bytes) => png_response(bytes),
        Err(e) => {
            info!(tile = %address, error = %e, "tile resolution failed");
            error_response(&e)
        }
    }
}

/// GET /placeholder.png - the fixed transparent fallback image.
pub async fn placeholder_handler() -> Response {
    png_response(placeholder_png())
}

// ============================================================================
// Monitoring
// ============================================================================

/// GET /health - basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(handle.render().into())
        .unwrap()
}
