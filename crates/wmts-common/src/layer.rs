//! Layer metadata exposed by the layer listing.

use crate::GeoBoundingBox;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Native pixel size in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Degrees of longitude per pixel
    pub x: f64,
    /// Degrees of latitude per pixel
    pub y: f64,
}

/// Read-only description of one raster layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
    /// Unique layer name (the source file stem)
    pub name: String,

    /// Source file on disk
    pub path: PathBuf,

    /// Geographic extent of the raster
    pub extent: GeoBoundingBox,

    /// Number of bands in the source raster
    pub band_count: usize,

    /// Native resolution
    pub resolution: Resolution,

    /// Raster width in pixels
    pub width: u32,

    /// Raster height in pixels
    pub height: u32,
}
