//! Shared fixtures for wmts-api integration tests.

#![allow(dead_code)]

use raster::{DatasetInfo, RasterDataset, RasterError, RasterSource};
use renderer::TileEncoder;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::{TileDiskCache, TileMemoryCache};
use wmts_api::resolver::{ResolverOptions, TileResolver};
use wmts_api::LayerRegistry;
use wmts_common::{GeoBoundingBox, PixelBuffer, PixelLayout};

/// In-memory dataset that counts window reads.
pub struct MockDataset {
    info: DatasetInfo,
    color: [u8; 3],
    delay: Duration,
    failures_left: AtomicUsize,
    panics: bool,
    pub reads: AtomicUsize,
}

impl MockDataset {
    pub fn solid(extent: GeoBoundingBox, color: [u8; 3]) -> Self {
        Self {
            info: DatasetInfo {
                width: 1000,
                height: 500,
                bands: 3,
                extent,
            },
            color,
            delay: Duration::ZERO,
            failures_left: AtomicUsize::new(0),
            panics: false,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn world(color: [u8; 3]) -> Self {
        Self::solid(GeoBoundingBox::from_edges(-180.0, -85.06, 180.0, 85.06), color)
    }

    /// Every read blocks for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The first `count` reads fail.
    pub fn failing(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Every read panics.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl RasterDataset for MockDataset {
    fn info(&self) -> &DatasetInfo {
        &self.info
    }

    fn read_window(
        &self,
        _bbox: &GeoBoundingBox,
        width: u32,
        height: u32,
    ) -> raster::Result<PixelBuffer> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panics {
            panic!("mock dataset panicked");
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RasterError::InvalidDimensions { width: 0, height: 0 });
        }

        let plane = width as usize * height as usize;
        let mut data = Vec::with_capacity(plane * 3);
        for value in self.color {
            data.extend(std::iter::repeat(value).take(plane));
        }
        Ok(PixelBuffer::new(width, height, 3, PixelLayout::Planar, data))
    }
}

/// Registry with one layer per `(name, dataset)` pair.
pub fn registry(layers: Vec<(&str, Arc<MockDataset>)>) -> LayerRegistry {
    LayerRegistry::from_sources(layers.into_iter().map(|(name, dataset)| {
        RasterSource::from_dataset(
            name,
            Path::new(&format!("{}.tif", name)),
            dataset,
            [255, 255, 255],
        )
    }))
    .expect("layer names are unique")
}

pub fn resolver(registry: LayerRegistry) -> TileResolver {
    resolver_with(registry, None, None)
}

pub fn resolver_with(
    registry: LayerRegistry,
    request_timeout: Option<Duration>,
    disk: Option<TileDiskCache>,
) -> TileResolver {
    TileResolver::new(
        Arc::new(registry),
        ResolverOptions {
            tile_size: 256,
            encoder: TileEncoder::default(),
            memory: Arc::new(TileMemoryCache::new(64, 1024, None)),
            disk: disk.map(Arc::new),
            request_timeout,
        },
    )
}
