//! Tile resolution: cache lookup, duplicate suppression and rendering.
//!
//! A request is answered from the memory cache, then the disk tier. On a miss
//! the first request for a tile starts one computation in its own task; every
//! concurrent request for the same tile waits for that computation's result.
//! Crop and encode run on the blocking pool.

use crate::metrics::{self, CacheTier};
use crate::registry::LayerRegistry;
use bytes::Bytes;
use raster::{RasterError, RasterSource};
use renderer::{EncodeError, TileEncoder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::{Registration, RequestCoalescer, TileDiskCache, TileMemoryCache};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};
use wmts_common::{TileAddress, TileAddressError, TileKey};

/// Why computing a tile failed.
#[derive(Debug, Error)]
pub enum TileResolutionError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Tile task failed: {0}")]
    Task(String),

    #[error("Tile computation was interrupted")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid parameter value for 'layer': unknown layer '{0}'")]
    UnknownLayer(String),

    #[error(transparent)]
    InvalidTileAddress(#[from] TileAddressError),

    #[error("{0}")]
    Resolution(Arc<TileResolutionError>),

    #[error("Request timeout")]
    Timeout,
}

impl ResolveError {
    /// OGC OWS exception code for this error.
    pub fn ows_exception_code(&self) -> &'static str {
        match self {
            ResolveError::UnknownLayer(_) | ResolveError::InvalidTileAddress(_) => {
                "InvalidParameterValue"
            }
            ResolveError::Resolution(e) => match e.as_ref() {
                TileResolutionError::Raster(RasterError::OutOfBounds { .. }) => "TileOutOfRange",
                _ => "NoApplicableCode",
            },
            ResolveError::Timeout => "NoApplicableCode",
        }
    }

    /// HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            ResolveError::UnknownLayer(_) | ResolveError::InvalidTileAddress(_) => 400,
            ResolveError::Resolution(e) => match e.as_ref() {
                TileResolutionError::Raster(RasterError::OutOfBounds { .. }) => 400,
                _ => 500,
            },
            ResolveError::Timeout => 504,
        }
    }
}

/// What a computation publishes to every waiting request.
pub type TileOutcome = Result<Bytes, Arc<TileResolutionError>>;

/// Cache tiers and rendering settings used by [`TileResolver`].
pub struct ResolverOptions {
    pub tile_size: u32,
    pub encoder: TileEncoder,
    pub memory: Arc<TileMemoryCache>,
    pub disk: Option<Arc<TileDiskCache>>,
    pub request_timeout: Option<Duration>,
}

/// Turns `(layer, zoom, col, row)` into encoded tile bytes.
#[derive(Clone)]
pub struct TileResolver {
    registry: Arc<LayerRegistry>,
    tile_size: u32,
    encoder: TileEncoder,
    memory: Arc<TileMemoryCache>,
    disk: Option<Arc<TileDiskCache>>,
    coalescer: RequestCoalescer<TileKey, TileOutcome>,
    request_timeout: Option<Duration>,
}

impl TileResolver {
    pub fn new(registry: Arc<LayerRegistry>, options: ResolverOptions) -> Self {
        Self {
            registry,
            tile_size: options.tile_size,
            encoder: options.encoder,
            memory: options.memory,
            disk: options.disk,
            coalescer: RequestCoalescer::new(),
            request_timeout: options.request_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<LayerRegistry> {
        &self.registry
    }

    pub fn memory_cache(&self) -> &TileMemoryCache {
        &self.memory
    }

    pub fn disk_cache(&self) -> Option<&TileDiskCache> {
        self.disk.as_deref()
    }

    pub fn coalescer(&self) -> &RequestCoalescer<TileKey, TileOutcome> {
        &self.coalescer
    }

    /// Return the JPEG tile at `(zoom, col, row)` of `layer`.
    ///
    /// Repeated calls return identical bytes. Failures are not cached.
    #[instrument(skip(self))]
    pub async fn resolve_tile(
        &self,
        layer: &str,
        zoom: i64,
        col: i64,
        row: i64,
    ) -> Result<Bytes, ResolveError> {
        let source = self
            .registry
            .lookup(layer)
            .ok_or_else(|| ResolveError::UnknownLayer(layer.to_string()))?;
        let address = TileAddress::new(zoom, col, row)?;
        let key = TileKey::new(layer, address);
        metrics::record_tile_request();

        if let Some(tile) = self.memory.get(&key).await {
            metrics::record_cache_hit(CacheTier::Memory);
            return Ok(tile);
        }

        if let Some(disk) = &self.disk {
            match disk.get(&key).await {
                Ok(Some(tile)) => {
                    self.memory.insert(key, tile.clone()).await;
                    metrics::record_cache_hit(CacheTier::Disk);
                    return Ok(tile);
                }
                Ok(None) => {}
                Err(e) => warn!(tile = %key, error = %e, "Disk cache read failed"),
            }
        }

        metrics::record_cache_miss();
        let rx = self.join_or_start(key, source);

        match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait_for(rx))
                .await
                .map_err(|_| ResolveError::Timeout)?,
            None => wait_for(rx).await,
        }
    }

    /// Subscribe to the computation of `key`, starting it if none is running.
    fn join_or_start(
        &self,
        key: TileKey,
        source: Arc<RasterSource>,
    ) -> broadcast::Receiver<TileOutcome> {
        match self.coalescer.register(key) {
            Registration::Leader(in_flight) => {
                let rx = in_flight.subscribe();
                let resolver = self.clone();
                tokio::spawn(async move {
                    let key = in_flight.key().clone();
                    let outcome = resolver.compute(&key, source).await;
                    in_flight.complete(outcome.clone());
                    if let (Ok(tile), Some(disk)) = (&outcome, &resolver.disk) {
                        if let Err(e) = disk.put(&key, tile).await {
                            warn!(tile = %key, error = %e, "Disk cache write failed");
                        }
                    }
                });
                rx
            }
            Registration::Follower(rx) => {
                metrics::record_coalesced();
                rx
            }
        }
    }

    /// Render one tile and store it in memory.
    async fn compute(&self, key: &TileKey, source: Arc<RasterSource>) -> TileOutcome {
        // Another computation may have finished between our miss and registration
        if let Some(tile) = self.memory.get_untracked(key).await {
            return Ok(tile);
        }

        let started = Instant::now();
        let bounds = key.address.bounds();
        let (size, encoder) = (self.tile_size, self.encoder);

        let rendered = tokio::task::spawn_blocking(move || {
            let pixels = source.crop(&bounds, size, size)?;
            Ok::<_, TileResolutionError>(encoder.encode(&pixels)?)
        })
        .await
        .unwrap_or_else(|e| Err(TileResolutionError::Task(e.to_string())));

        match rendered {
            Ok(tile) => {
                metrics::record_render(started.elapsed());
                debug!(
                    tile = %key,
                    bytes = tile.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Rendered tile"
                );
                self.memory.insert(key.clone(), tile.clone()).await;
                Ok(tile)
            }
            Err(e) => {
                metrics::record_error();
                warn!(tile = %key, error = %e, "Tile computation failed");
                Err(Arc::new(e))
            }
        }
    }
}

async fn wait_for(mut rx: broadcast::Receiver<TileOutcome>) -> Result<Bytes, ResolveError> {
    match rx.recv().await {
        Ok(outcome) => outcome.map_err(ResolveError::Resolution),
        // The computing task ended without publishing
        Err(_) => Err(ResolveError::Resolution(Arc::new(
            TileResolutionError::Interrupted,
        ))),
    }
}
