//! Tile serving metrics, exported in Prometheus format at `/metrics`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

pub const TILE_REQUESTS: &str = "tile_requests_total";
pub const TILE_CACHE_HITS: &str = "tile_cache_hits_total";
pub const TILE_CACHE_MISSES: &str = "tile_cache_misses_total";
pub const TILE_COALESCED: &str = "tile_coalesced_total";
pub const TILE_RENDER_DURATION: &str = "tile_render_duration_ms";
pub const TILE_ERRORS: &str = "tile_errors_total";

/// Cache tier that served a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Memory,
    Disk,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Memory => "memory",
            CacheTier::Disk => "disk",
        }
    }
}

/// Register metric descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(TILE_REQUESTS, "Tile requests with a valid layer and address");
    describe_counter!(TILE_CACHE_HITS, "Tiles served from cache, by tier");
    describe_counter!(TILE_CACHE_MISSES, "Tile requests that missed every cache tier");
    describe_counter!(TILE_COALESCED, "Tile requests that joined an in-flight computation");
    describe_histogram!(TILE_RENDER_DURATION, "Time to crop and encode one tile");
    describe_counter!(TILE_ERRORS, "Failed tile computations");
}

pub fn record_tile_request() {
    counter!(TILE_REQUESTS).increment(1);
}

pub fn record_cache_hit(tier: CacheTier) {
    counter!(TILE_CACHE_HITS, "tier" => tier.as_str()).increment(1);
}

pub fn record_cache_miss() {
    counter!(TILE_CACHE_MISSES).increment(1);
}

pub fn record_coalesced() {
    counter!(TILE_COALESCED).increment(1);
}

pub fn record_render(duration: Duration) {
    histogram!(TILE_RENDER_DURATION).record(duration.as_secs_f64() * 1000.0);
}

pub fn record_error() {
    counter!(TILE_ERRORS).increment(1);
}
