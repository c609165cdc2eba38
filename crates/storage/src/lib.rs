//! Tile storage for the WMTS service.
//!
//! Provides:
//! - A sharded in-memory LRU cache for encoded tiles
//! - An optional bounded on-disk tier
//! - Per-key request coalescing so a tile is only computed once at a time

pub mod coalesce;
pub mod tile_disk_cache;
pub mod tile_memory_cache;

pub use coalesce::{CoalescerStats, InFlight, Registration, RequestCoalescer};
pub use tile_disk_cache::{DiskCacheError, TileDiskCache, TileDiskCacheStats};
pub use tile_memory_cache::{TileMemoryCache, TileMemoryCacheStats};
