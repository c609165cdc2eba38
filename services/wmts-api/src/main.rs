//! WMTS tile server.
//!
//! Serves JPEG tiles cropped on demand from the GeoTIFF files under a raster
//! root directory.

use anyhow::{Context, Result};
use clap::Parser;
use raster::GeoTiffDecoder;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wmts_api::config::{Args, LogFormat, ServerConfig};
use wmts_api::{metrics, router, AppState, LayerRegistry};

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = ServerConfig::try_from(args).context("Invalid configuration")?;

    init_tracing(&config)?;

    // Build tokio runtime with configurable worker threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = config.worker_threads {
        info!("Configuring tokio runtime with {} worker threads", threads);
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(config))
}

fn init_tracing(config: &ServerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;

    let builder = FmtSubscriber::builder().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }
    Ok(())
}

async fn async_main(config: ServerConfig) -> Result<()> {
    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    metrics::describe();
    info!("Prometheus metrics exporter initialized");

    let registry = LayerRegistry::discover(
        &config.raster_root,
        &config.extensions,
        &GeoTiffDecoder,
        config.nodata_fill,
    )
    .with_context(|| format!("Failed to load layers from {}", config.raster_root.display()))?;

    info!(
        layers = registry.len(),
        names = ?registry.names().collect::<Vec<_>>(),
        "Layers loaded"
    );

    let state = Arc::new(
        AppState::new(&config, registry, Some(prometheus_handle))
            .await
            .context("Failed to initialize tile caches")?,
    );

    let app = router(state.clone(), config.static_dir.as_deref());

    info!(
        address = %config.listen,
        tile_size = config.tile_size,
        jpeg_quality = config.jpeg_quality,
        cache_max_mb = config.cache_max_mb,
        cache_max_entries = config.cache_max_entries,
        disk_cache = config.disk_cache.is_some(),
        "Starting WMTS server"
    );

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await?;

    // Print stats
    let memory = state.resolver.memory_cache().stats();
    info!(
        hits = memory.hits,
        misses = memory.misses,
        evictions = memory.evictions,
        entries = memory.entry_count,
        "Memory cache statistics"
    );
    state.resolver.coalescer().log_stats();

    Ok(())
}
