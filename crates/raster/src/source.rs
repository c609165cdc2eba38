//! A named raster layer that crops tile windows into RGB pixel buffers.

use crate::{RasterDataset, RasterDecoder, RasterError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wmts_common::{GeoBoundingBox, LayerMetadata, PixelBuffer, PixelLayout};

/// Fill colour for no-data pixels when none is configured (white).
pub const DEFAULT_FILL: [u8; 3] = [255, 255, 255];

/// One raster layer.
///
/// Immutable after construction; `crop` may be called from any number of
/// threads at once.
pub struct RasterSource {
    name: String,
    path: PathBuf,
    dataset: Arc<dyn RasterDataset>,
    fill: [u8; 3],
}

impl RasterSource {
    /// Open `path` through `decoder` as layer `name`.
    pub fn open(
        name: impl Into<String>,
        path: &Path,
        decoder: &dyn RasterDecoder,
        fill: [u8; 3],
    ) -> Result<Self> {
        let dataset = decoder.open(path)?;
        Ok(Self::from_dataset(name, path, dataset, fill))
    }

    /// Wrap an already opened dataset.
    pub fn from_dataset(
        name: impl Into<String>,
        path: &Path,
        dataset: Arc<dyn RasterDataset>,
        fill: [u8; 3],
    ) -> Self {
        Self {
            name: name.into(),
            path: path.to_path_buf(),
            dataset,
            fill,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extent(&self) -> GeoBoundingBox {
        self.dataset.info().extent
    }

    /// Snapshot of the layer's metadata for listings.
    pub fn metadata(&self) -> LayerMetadata {
        let info = self.dataset.info();
        LayerMetadata {
            name: self.name.clone(),
            path: self.path.clone(),
            extent: info.extent,
            band_count: info.bands,
            resolution: info.resolution(),
            width: info.width,
            height: info.height,
        }
    }

    /// Crop `bbox` out of the raster into a `width × height` RGB buffer.
    ///
    /// The result is band-planar with exactly three bands. Bands past the
    /// third are dropped and one- or two-band rasters are replicated into
    /// grey. Pixels that are 0 in all colour bands, which includes everything
    /// outside the raster, become the fill colour.
    pub fn crop(&self, bbox: &GeoBoundingBox, width: u32, height: u32) -> Result<PixelBuffer> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }

        let extent = self.extent();
        if !bbox.intersects(&extent) {
            return Err(RasterError::OutOfBounds {
                requested: *bbox,
                extent,
            });
        }

        let window = self.dataset.read_window(bbox, width, height)?;
        if window.bands == 0
            || window.width != width
            || window.height != height
            || window.data.len() != window.expected_len()
        {
            return Err(RasterError::InvalidWindow {
                expected: width as usize * height as usize * window.bands.max(1),
                actual: window.data.len(),
            });
        }

        Ok(to_rgb(&window, self.fill))
    }
}

impl std::fmt::Debug for RasterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSource")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("info", self.dataset.info())
            .finish()
    }
}

fn to_rgb(window: &PixelBuffer, fill: [u8; 3]) -> PixelBuffer {
    let pixels = window.pixel_count();
    let source_bands: [usize; 3] = if window.bands >= 3 { [0, 1, 2] } else { [0, 0, 0] };

    let mut rgb = PixelBuffer::filled(window.width, window.height, 3, PixelLayout::Planar, 0);
    for pixel in 0..pixels {
        let color = source_bands.map(|band| window.sample(pixel, band));
        let color = if color == [0, 0, 0] { fill } else { color };
        for (band, value) in color.into_iter().enumerate() {
            rgb.data[band * pixels + pixel] = value;
        }
    }
    rgb
}
