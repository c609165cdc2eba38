//! Error types for raster access.

use std::path::PathBuf;
use thiserror::Error;
use wmts_common::GeoBoundingBox;

/// Result type alias using RasterError.
pub type Result<T> = std::result::Result<T, RasterError>;

/// Errors raised while opening or reading a raster.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TIFF decode error in {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("{0} has no usable georeferencing (ModelTiepoint/ModelPixelScale or ModelTransformation)")]
    MissingGeoreference(PathBuf),

    #[error("{0} uses a projected coordinate system; only geographic (WGS84) rasters are supported")]
    UnsupportedProjection(PathBuf),

    #[error("{0} stores bands in separate planes; only interleaved layouts are supported")]
    UnsupportedLayout(PathBuf),

    #[error("{path} has unsupported color type {color_type}")]
    UnsupportedColorType { path: PathBuf, color_type: String },

    #[error("Requested area {requested} does not intersect raster extent {extent}")]
    OutOfBounds {
        requested: GeoBoundingBox,
        extent: GeoBoundingBox,
    },

    #[error("Invalid output dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Decoder returned {actual} samples, expected {expected}")]
    InvalidWindow { expected: usize, actual: usize },
}
