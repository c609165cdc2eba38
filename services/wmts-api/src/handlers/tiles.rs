//! Tile and layer listing handlers.
//!
//! Supports two access patterns:
//! - KVP: `/getTile?layer=&tilematrix=&tilecol=&tilerow=` with case-insensitive keys
//! - Path: `/wmts/{layer}/{z}/{x}/{y}[.jpg|.jpeg]`

use axum::{
    extract::{Extension, Path, Query},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use wmts_common::LayerMetadata;

use super::common::{jpeg_response, WmtsRequestError};
use crate::state::AppState;

// ============================================================================
// Parameters
// ============================================================================

/// Parsed tile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub layer: String,
    pub zoom: i64,
    pub col: i64,
    pub row: i64,
}

impl TileRequest {
    /// Parse KVP query parameters. Keys are matched case-insensitively and a
    /// `tilematrix` of the form `<prefix>:<zoom>` uses only the part after the
    /// last colon.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, WmtsRequestError> {
        let params: HashMap<String, &str> = params
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.as_str()))
            .collect();
        let required = |name: &'static str| {
            params
                .get(name)
                .copied()
                .ok_or(WmtsRequestError::MissingParameter(name))
        };

        let layer = required("layer")?.to_string();
        let tile_matrix = required("tilematrix")?;
        let zoom_str = tile_matrix.rsplit(':').next().unwrap_or(tile_matrix);

        Ok(Self {
            layer,
            zoom: parse_integer("tilematrix", zoom_str)?,
            col: parse_integer("tilecol", required("tilecol")?)?,
            row: parse_integer("tilerow", required("tilerow")?)?,
        })
    }

    /// Parse path segments; the row may carry a `.jpg` or `.jpeg` suffix.
    pub fn from_path(layer: String, z: &str, x: &str, y: &str) -> Result<Self, WmtsRequestError> {
        let row = match y.rsplit_once('.') {
            Some((row, ext)) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
                row
            }
            _ => y,
        };

        Ok(Self {
            layer,
            zoom: parse_integer("tilematrix", z)?,
            col: parse_integer("tilecol", x)?,
            row: parse_integer("tilerow", row)?,
        })
    }
}

fn parse_integer(param: &'static str, value: &str) -> Result<i64, WmtsRequestError> {
    value
        .trim()
        .parse()
        .map_err(|_| WmtsRequestError::InvalidParameter {
            param,
            value: value.to_string(),
        })
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /getLayers - metadata of every layer, sorted by name
#[instrument(skip(state))]
pub async fn get_layers_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<LayerMetadata>> {
    Json(state.registry().list_all())
}

/// GET /getTile - KVP tile request
#[instrument(skip(state))]
pub async fn get_tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match TileRequest::from_query(&params) {
        Ok(request) => serve_tile(&state, request).await,
        Err(e) => e.into_response(),
    }
}

/// GET /wmts/:layer/:z/:x/:y - path-style tile request
#[instrument(skip(state))]
pub async fn wmts_path_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((layer, z, x, y)): Path<(String, String, String, String)>,
) -> Response {
    match TileRequest::from_path(layer, &z, &x, &y) {
        Ok(request) => serve_tile(&state, request).await,
        Err(e) => e.into_response(),
    }
}

async fn serve_tile(state: &AppState, request: TileRequest) -> Response {
    match state
        .resolver
        .resolve_tile(&request.layer, request.zoom, request.col, request.row)
        .await
    {
        Ok(tile) => jpeg_response(tile),
        Err(e) => e.into_response(),
    }
}
