//! The raster decode capability.

use crate::Result;
use std::path::Path;
use std::sync::Arc;
use wmts_common::{GeoBoundingBox, PixelBuffer, Resolution};

/// Static facts about an opened raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetInfo {
    pub width: u32,
    pub height: u32,
    pub bands: usize,
    pub extent: GeoBoundingBox,
}

impl DatasetInfo {
    /// Degrees per pixel on each axis.
    pub fn resolution(&self) -> Resolution {
        Resolution {
            x: self.extent.width() / self.width as f64,
            y: self.extent.height() / self.height as f64,
        }
    }
}

/// Opens raster files.
pub trait RasterDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn RasterDataset>>;
}

/// An opened raster that can be sampled into arbitrary windows.
///
/// Implementations are read-only after opening and must tolerate concurrent
/// `read_window` calls.
pub trait RasterDataset: Send + Sync {
    fn info(&self) -> &DatasetInfo;

    /// Resample the part of the raster under `bbox` into a `width × height`
    /// band-planar buffer with the dataset's own band count.
    ///
    /// Output pixels that fall outside the raster are 0 in every band.
    fn read_window(&self, bbox: &GeoBoundingBox, width: u32, height: u32) -> Result<PixelBuffer>;
}
