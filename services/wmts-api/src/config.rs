//! Command line and environment configuration.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Largest accepted tile edge in pixels.
pub const MAX_TILE_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "wmts-api")]
#[command(about = "WMTS tile server for local GeoTIFF rasters")]
pub struct Args {
    /// Listen address
    #[arg(short, long, env = "WMTS_LISTEN", default_value = "0.0.0.0:4815")]
    pub listen: String,

    /// Directory scanned recursively for rasters
    #[arg(long, env = "WMTS_RASTER_ROOT", default_value = "./geotiffs")]
    pub raster_root: PathBuf,

    /// File extensions treated as rasters (case-insensitive)
    #[arg(
        long,
        env = "WMTS_EXTENSIONS",
        value_delimiter = ',',
        default_value = "tif,tiff"
    )]
    pub extensions: Vec<String>,

    /// Tile edge length in pixels
    #[arg(long, env = "WMTS_TILE_SIZE", default_value_t = 256)]
    pub tile_size: u32,

    /// JPEG quality (clamped to 1-100)
    #[arg(long, env = "JPEG_QUALITY", default_value_t = renderer::DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,

    /// Colour for pixels without data, as `r,g,b`
    #[arg(long, env = "WMTS_NODATA_FILL", default_value = "255,255,255")]
    pub nodata_fill: String,

    /// Memory cache budget in megabytes
    #[arg(long, env = "WMTS_CACHE_MAX_MB", default_value_t = 256)]
    pub cache_max_mb: usize,

    /// Memory cache budget in tiles
    #[arg(long, env = "WMTS_CACHE_MAX_ENTRIES", default_value_t = 16_384)]
    pub cache_max_entries: usize,

    /// Memory cache time-to-live in seconds (0 disables expiry)
    #[arg(long, env = "WMTS_CACHE_TTL_SECS", default_value_t = 0)]
    pub cache_ttl_secs: u64,

    /// Directory for the on-disk tile tier (disabled when unset)
    #[arg(long, env = "WMTS_DISK_CACHE_DIR")]
    pub disk_cache_dir: Option<PathBuf>,

    /// Maximum number of tiles kept in the on-disk tier
    #[arg(long, env = "WMTS_DISK_CACHE_MAX_ENTRIES", default_value_t = 100_000)]
    pub disk_cache_max_entries: usize,

    /// Seconds a tile request may wait before failing (0 waits forever)
    #[arg(long, env = "WMTS_REQUEST_TIMEOUT_SECS", default_value_t = 0)]
    pub request_timeout_secs: u64,

    /// Directory of static frontend files served at `/`
    #[arg(long, env = "WMTS_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long, env = "TOKIO_WORKER_THREADS")]
    pub worker_threads: Option<usize>,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid listen address '{0}'")]
    InvalidListen(String),

    #[error("Invalid no-data fill '{0}': expected three comma separated values 0-255")]
    InvalidFill(String),

    #[error("Tile size must be between 1 and {MAX_TILE_SIZE}, got {0}")]
    InvalidTileSize(u32),

    #[error("At least one raster extension is required")]
    NoExtensions,

    #[error("Memory cache needs a non-zero byte and entry budget")]
    EmptyCache,

    #[error("Disk cache needs room for at least one tile")]
    EmptyDiskCache,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiskCacheConfig {
    pub dir: PathBuf,
    pub max_entries: usize,
}

/// Validated server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub raster_root: PathBuf,
    /// Lower-case extensions without a leading dot
    pub extensions: Vec<String>,
    pub tile_size: u32,
    pub jpeg_quality: u8,
    pub nodata_fill: [u8; 3],
    pub cache_max_mb: usize,
    pub cache_max_entries: usize,
    pub cache_ttl: Option<Duration>,
    pub disk_cache: Option<DiskCacheConfig>,
    pub request_timeout: Option<Duration>,
    pub static_dir: Option<PathBuf>,
    pub worker_threads: Option<usize>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl TryFrom<Args> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let listen = args
            .listen
            .parse()
            .map_err(|_| ConfigError::InvalidListen(args.listen.clone()))?;

        if args.tile_size == 0 || args.tile_size > MAX_TILE_SIZE {
            return Err(ConfigError::InvalidTileSize(args.tile_size));
        }

        let extensions: Vec<String> = args
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }

        if args.cache_max_mb == 0 || args.cache_max_entries == 0 {
            return Err(ConfigError::EmptyCache);
        }

        let disk_cache = match args.disk_cache_dir {
            Some(_) if args.disk_cache_max_entries == 0 => {
                return Err(ConfigError::EmptyDiskCache);
            }
            Some(dir) => Some(DiskCacheConfig {
                dir,
                max_entries: args.disk_cache_max_entries,
            }),
            None => None,
        };

        Ok(Self {
            listen,
            raster_root: args.raster_root,
            extensions,
            tile_size: args.tile_size,
            jpeg_quality: args.jpeg_quality.clamp(1, 100),
            nodata_fill: parse_fill(&args.nodata_fill)?,
            cache_max_mb: args.cache_max_mb,
            cache_max_entries: args.cache_max_entries,
            cache_ttl: non_zero_secs(args.cache_ttl_secs),
            disk_cache,
            request_timeout: non_zero_secs(args.request_timeout_secs),
            static_dir: args.static_dir,
            worker_threads: args.worker_threads,
            log_level: args.log_level,
            log_format: args.log_format,
        })
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Parse an `r,g,b` colour.
pub fn parse_fill(value: &str) -> Result<[u8; 3], ConfigError> {
    let invalid = || ConfigError::InvalidFill(value.to_string());

    let parts: Vec<u8> = value
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;

    parts.try_into().map_err(|_| invalid())
}
