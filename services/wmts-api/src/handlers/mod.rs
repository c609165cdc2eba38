//! HTTP request handlers.
//!
//! - `tiles`: layer listing and GetTile (KVP and path style)
//! - `metrics`: health check and Prometheus metrics
//! - `common`: exception reports and request errors

pub mod common;
pub mod metrics;
pub mod tiles;

pub use common::{jpeg_response, wmts_exception, WmtsRequestError};
pub use metrics::{health_handler, metrics_handler};
pub use tiles::{get_layers_handler, get_tile_handler, wmts_path_handler, TileRequest};
