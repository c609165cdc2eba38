//! Application state and shared resources.

use metrics_exporter_prometheus::PrometheusHandle;
use renderer::TileEncoder;
use std::sync::Arc;
use storage::{DiskCacheError, TileDiskCache, TileMemoryCache};

use crate::config::ServerConfig;
use crate::registry::LayerRegistry;
use crate::resolver::{ResolverOptions, TileResolver};

/// Shared application state.
pub struct AppState {
    pub resolver: TileResolver,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the cache tiers described by `config` around `registry`.
    pub async fn new(
        config: &ServerConfig,
        registry: LayerRegistry,
        prometheus: Option<PrometheusHandle>,
    ) -> Result<Self, DiskCacheError> {
        let memory = Arc::new(TileMemoryCache::new(
            config.cache_max_mb,
            config.cache_max_entries,
            config.cache_ttl,
        ));

        let disk = match &config.disk_cache {
            Some(disk) => Some(Arc::new(
                TileDiskCache::open(&disk.dir, disk.max_entries).await?,
            )),
            None => None,
        };

        let resolver = TileResolver::new(
            Arc::new(registry),
            ResolverOptions {
                tile_size: config.tile_size,
                encoder: TileEncoder::new(config.jpeg_quality),
                memory,
                disk,
                request_timeout: config.request_timeout,
            },
        );

        Ok(Self {
            resolver,
            prometheus,
        })
    }

    pub fn registry(&self) -> &LayerRegistry {
        self.resolver.registry()
    }
}
