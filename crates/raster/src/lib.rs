//! Georeferenced raster access for tile rendering.
//!
//! The crate is split along the decode boundary:
//! - [`RasterDecoder`] / [`RasterDataset`]: the decode capability (open a file,
//!   read a resampled window), implemented for GeoTIFF by [`GeoTiffDecoder`]
//! - [`RasterSource`]: one named layer, cropping windows into RGB tiles

pub mod dataset;
pub mod error;
pub mod geotiff;
pub mod resample;
pub mod source;

pub use dataset::{DatasetInfo, RasterDataset, RasterDecoder};
pub use error::{RasterError, Result};
pub use geotiff::{GeoTiffDataset, GeoTiffDecoder, CHUNK_CACHE_CAPACITY};
pub use source::{RasterSource, DEFAULT_FILL};
