//! WMTS tile service for local GeoTIFF rasters.
//!
//! The library exposes the router and its building blocks so the binary and
//! the integration tests assemble the same service.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod registry;
pub mod resolver;
pub mod state;

use axum::{extract::Extension, routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use config::{Args, ServerConfig};
pub use registry::{LayerRegistry, RegistryError};
pub use resolver::{ResolveError, TileResolutionError, TileResolver};
pub use state::AppState;

/// Build the HTTP router.
///
/// When `static_dir` is set, unmatched paths are served from it.
pub fn router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        // Tile endpoints
        .route("/getLayers", get(handlers::get_layers_handler))
        .route("/getTile", get(handlers::get_tile_handler))
        .route("/wmts/:layer/:z/:x/:y", get(handlers::wmts_path_handler))
        // Health check
        .route("/health", get(handlers::health_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
