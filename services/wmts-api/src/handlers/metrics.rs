//! Health checks and Prometheus metrics endpoints.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

/// GET /health - liveness with the number of registered layers
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "layers": state.registry().len(),
        })),
    )
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let Some(handle) = &state.prometheus else {
        return (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response();
    };

    let memory = state.resolver.memory_cache().stats();
    let mut output = handle.render();
    output.push_str(&format!(
        "# HELP tile_memory_cache_bytes Current memory cache size in bytes\n# TYPE tile_memory_cache_bytes gauge\ntile_memory_cache_bytes {}\n",
        memory.size_bytes
    ));
    output.push_str(&format!(
        "# HELP tile_memory_cache_entries Current memory cache entries\n# TYPE tile_memory_cache_entries gauge\ntile_memory_cache_entries {}\n",
        memory.entry_count
    ));
    output.push_str(&format!(
        "# HELP tile_memory_cache_evictions Total memory cache evictions\n# TYPE tile_memory_cache_evictions counter\ntile_memory_cache_evictions {}\n",
        memory.evictions
    ));

    let coalescer = state.resolver.coalescer();
    let coalesced = coalescer.stats();
    output.push_str(&format!(
        "# HELP tile_coalescer_requests_total Tile computations requested through the coalescer\n# TYPE tile_coalescer_requests_total counter\ntile_coalescer_requests_total {}\n",
        coalesced.total_requests
    ));
    output.push_str(&format!(
        "# HELP tile_coalescer_joined_total Requests that joined an in-flight computation\n# TYPE tile_coalescer_joined_total counter\ntile_coalescer_joined_total {}\n",
        coalesced.coalesced_requests
    ));
    output.push_str(&format!(
        "# HELP tile_coalescer_in_flight Tile computations currently running\n# TYPE tile_coalescer_in_flight gauge\ntile_coalescer_in_flight {}\n",
        coalescer.in_flight_count()
    ));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        output,
    )
        .into_response()
}
