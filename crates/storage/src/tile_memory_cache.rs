//! In-memory LRU cache for encoded tiles.
//!
//! ## Sharding
//!
//! Keys are hashed onto up to 16 shards, each an independent
//! `RwLock<LruCache>`. Requests for tiles in different shards never contend.
//! The byte and entry budgets are split evenly between the shards, so the
//! totals never exceed the configured limits.
//!
//! ## Eviction
//!
//! Before an insert, least-recently-used entries of the target shard are
//! evicted until both the shard's byte budget and entry budget have room for
//! the new tile. Entries older than the optional TTL are dropped lazily on
//! read.

use bytes::Bytes;
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use wmts_common::TileKey;

/// Upper bound on the number of shards.
pub const MAX_SHARDS: usize = 16;

/// Sharded in-memory LRU cache keyed by [`TileKey`].
pub struct TileMemoryCache {
    shards: Vec<RwLock<Shard>>,
    shard_max_bytes: u64,
    shard_max_entries: usize,
    max_bytes: u64,
    max_entries: usize,
    ttl: Option<Duration>,
    counters: Counters,
}

struct Shard {
    entries: LruCache<TileKey, CachedTile>,
    bytes: u64,
}

impl Shard {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            bytes: 0,
        }
    }

    fn pop(&mut self, key: &TileKey) -> Option<CachedTile> {
        let tile = self.entries.pop(key)?;
        self.bytes -= tile.data.len() as u64;
        Some(tile)
    }

    fn pop_lru(&mut self) -> Option<CachedTile> {
        let (_, tile) = self.entries.pop_lru()?;
        self.bytes -= tile.data.len() as u64;
        Some(tile)
    }
}

struct CachedTile {
    data: Bytes,
    inserted_at: Instant,
}

impl CachedTile {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.inserted_at.elapsed() > ttl)
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
    bytes_evicted_total: AtomicU64,
    size_bytes: AtomicU64,
    entry_count: AtomicU64,
}

/// Point-in-time statistics for the memory cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileMemoryCacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses (including expired entries)
    pub misses: u64,
    /// Total tiles stored
    pub inserts: u64,
    /// Total entries evicted to stay within budget
    pub evictions: u64,
    /// Total entries dropped because their TTL elapsed
    pub expired: u64,
    /// Total bytes evicted
    pub bytes_evicted_total: u64,
    /// Current cache size in bytes
    pub size_bytes: u64,
    /// Current number of entries
    pub entry_count: u64,
}

impl TileMemoryCacheStats {
    /// Cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl TileMemoryCache {
    /// Create a cache bounded by `max_size_mb` megabytes and `max_entries`
    /// tiles. `ttl` of `None` keeps entries until they are evicted.
    ///
    /// # Example
    /// ```
    /// use storage::TileMemoryCache;
    ///
    /// // 256MB, at most 10k tiles, no expiry
    /// let cache = TileMemoryCache::new(256, 10_000, None);
    /// assert_eq!(cache.max_bytes(), 256 * 1024 * 1024);
    /// ```
    pub fn new(max_size_mb: usize, max_entries: usize, ttl: Option<Duration>) -> Self {
        Self::with_limits((max_size_mb as u64) * 1024 * 1024, max_entries, ttl)
    }

    /// Create a cache with an exact byte budget.
    pub fn with_limits(max_bytes: u64, max_entries: usize, ttl: Option<Duration>) -> Self {
        // Never more shards than entries, or the per-shard entry budget rounds to zero
        let shard_count = max_entries.clamp(1, MAX_SHARDS);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(Shard::new()))
            .collect();

        Self {
            shards,
            shard_max_bytes: max_bytes / shard_count as u64,
            shard_max_entries: max_entries / shard_count,
            max_bytes,
            max_entries,
            ttl,
            counters: Counters::default(),
        }
    }

    fn shard_index(&self, key: &TileKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Get a tile, counting the lookup as a hit or miss.
    pub async fn get(&self, key: &TileKey) -> Option<Bytes> {
        let found = self.lookup(key).await;
        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Get a tile without touching the hit/miss counters.
    ///
    /// Used for the second check a tile computation makes before doing work,
    /// so one request is not counted twice.
    pub async fn get_untracked(&self, key: &TileKey) -> Option<Bytes> {
        self.lookup(key).await
    }

    async fn lookup(&self, key: &TileKey) -> Option<Bytes> {
        // LruCache::get promotes the entry, so even reads need the write lock
        let mut shard = self.shards[self.shard_index(key)].write().await;

        let expired = shard.entries.get(key)?.is_expired(self.ttl);
        if expired {
            if let Some(tile) = shard.pop(key) {
                self.release(tile.data.len() as u64, 1);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
            }
            return None;
        }
        shard.entries.get(key).map(|tile| tile.data.clone())
    }

    /// Store a tile, evicting least-recently-used entries as needed.
    ///
    /// Tiles larger than a shard's byte budget are not cached.
    pub async fn insert(&self, key: TileKey, data: Bytes) {
        let tile_size = data.len() as u64;
        if tile_size > self.shard_max_bytes || self.shard_max_entries == 0 {
            debug!(
                key = %key,
                tile_size,
                shard_max_bytes = self.shard_max_bytes,
                "Tile exceeds cache shard budget, not caching"
            );
            return;
        }

        let mut shard = self.shards[self.shard_index(&key)].write().await;

        if let Some(existing) = shard.pop(&key) {
            self.release(existing.data.len() as u64, 1);
        }

        let mut evicted = 0u64;
        let mut bytes_freed = 0u64;
        while shard.entries.len() >= self.shard_max_entries
            || shard.bytes + tile_size > self.shard_max_bytes
        {
            let Some(tile) = shard.pop_lru() else { break };
            bytes_freed += tile.data.len() as u64;
            evicted += 1;
        }

        if evicted > 0 {
            self.release(bytes_freed, evicted);
            self.counters.evictions.fetch_add(evicted, Ordering::Relaxed);
            self.counters
                .bytes_evicted_total
                .fetch_add(bytes_freed, Ordering::Relaxed);
            debug!(
                entries_evicted = evicted,
                bytes_freed,
                "Memory cache shard eviction"
            );
        }

        shard.bytes += tile_size;
        shard.entries.put(
            key,
            CachedTile {
                data,
                inserted_at: Instant::now(),
            },
        );
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
        self.counters.entry_count.fetch_add(1, Ordering::Relaxed);
        self.counters
            .size_bytes
            .fetch_add(tile_size, Ordering::Relaxed);
    }

    /// Remove a tile, returning it if present.
    pub async fn remove(&self, key: &TileKey) -> Option<Bytes> {
        let mut shard = self.shards[self.shard_index(key)].write().await;
        let tile = shard.pop(key)?;
        self.release(tile.data.len() as u64, 1);
        Some(tile.data)
    }

    fn release(&self, bytes: u64, entries: u64) {
        self.counters.size_bytes.fetch_sub(bytes, Ordering::Relaxed);
        self.counters
            .entry_count
            .fetch_sub(entries, Ordering::Relaxed);
    }

    /// Drop every entry. Statistics other than size and count are kept.
    pub async fn clear(&self) {
        for shard in &self.shards {
            let mut shard = shard.write().await;
            self.release(shard.bytes, shard.entries.len() as u64);
            shard.entries.clear();
            shard.bytes = 0;
        }
    }

    /// Current statistics.
    pub fn stats(&self) -> TileMemoryCacheStats {
        let c = &self.counters;
        TileMemoryCacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            inserts: c.inserts.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expired: c.expired.load(Ordering::Relaxed),
            bytes_evicted_total: c.bytes_evicted_total.load(Ordering::Relaxed),
            size_bytes: c.size_bytes.load(Ordering::Relaxed),
            entry_count: c.entry_count.load(Ordering::Relaxed),
        }
    }

    /// Number of entries held by each shard.
    pub async fn shard_entry_counts(&self) -> Vec<usize> {
        let mut counts = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            counts.push(shard.read().await.entries.len());
        }
        counts
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn len(&self) -> usize {
        self.counters.entry_count.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> u64 {
        self.counters.size_bytes.load(Ordering::Relaxed)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Byte utilisation ratio (0.0 - 1.0).
    pub fn utilization(&self) -> f64 {
        if self.max_bytes == 0 {
            0.0
        } else {
            self.size_bytes() as f64 / self.max_bytes as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmts_common::TileAddress;

    fn key(layer: &str, col: i64) -> TileKey {
        TileKey::new(layer, TileAddress::new(10, col, 0).unwrap())
    }

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = TileMemoryCache::new(100, 1000, None);

        assert!(cache.is_empty());
        assert!(cache.get(&key("a", 1)).await.is_none());

        let data = Bytes::from("test data");
        cache.insert(key("a", 1), data.clone()).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("a", 1)).await, Some(data));

        // Same address on another layer is a different tile
        assert!(cache.get(&key("b", 1)).await.is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.inserts, 1);
    }

    #[tokio::test]
    async fn test_get_untracked_skips_counters() {
        let cache = TileMemoryCache::new(100, 1000, None);
        cache.insert(key("a", 1), Bytes::from("x")).await;

        assert!(cache.get_untracked(&key("a", 1)).await.is_some());
        assert!(cache.get_untracked(&key("a", 2)).await.is_none());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }

    #[tokio::test]
    async fn test_cache_ttl_expiration() {
        let cache = TileMemoryCache::new(100, 1000, Some(Duration::from_millis(100)));
        cache.insert(key("a", 1), Bytes::from("test data")).await;

        assert!(cache.get(&key("a", 1)).await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get(&key("a", 1)).await.is_none());
        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.size_bytes, 0);
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let cache = TileMemoryCache::new(100, 1000, None);
        cache.insert(key("a", 1), Bytes::from("test data")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get(&key("a", 1)).await.is_some());
    }

    #[tokio::test]
    async fn test_entry_budget_evicts_lru() {
        // One entry means one shard holding one tile
        let cache = TileMemoryCache::new(100, 1, None);
        assert_eq!(cache.shard_count(), 1);

        cache.insert(key("a", 1), Bytes::from("one")).await;
        cache.insert(key("a", 2), Bytes::from("two")).await;

        assert!(cache.get(&key("a", 1)).await.is_none());
        assert!(cache.get(&key("a", 2)).await.is_some());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_lru_order_respects_reads() {
        // 16 shards with two entries each
        let cache = TileMemoryCache::new(100, 32, None);
        assert_eq!(cache.shard_count(), MAX_SHARDS);

        // Drive a single shard by picking keys that hash to the same one
        let shard = cache.shard_index(&key("a", 0));
        let keys: Vec<TileKey> = (0..1000)
            .map(|col| key("a", col))
            .filter(|k| cache.shard_index(k) == shard)
            .take(3)
            .collect();

        cache.insert(keys[0].clone(), Bytes::from("0")).await;
        cache.insert(keys[1].clone(), Bytes::from("1")).await;
        // Reading the oldest entry makes the second one least recently used
        assert!(cache.get(&keys[0]).await.is_some());
        cache.insert(keys[2].clone(), Bytes::from("2")).await;

        assert!(cache.get(&keys[0]).await.is_some());
        assert!(cache.get(&keys[1]).await.is_none());
        assert!(cache.get(&keys[2]).await.is_some());
    }

    #[tokio::test]
    async fn test_byte_budget_is_respected() {
        // 1MB over 16 shards: 64KB per shard
        let cache = TileMemoryCache::new(1, 10_000, None);
        let tile_10kb = Bytes::from(vec![0u8; 10 * 1024]);

        for col in 0..300 {
            cache.insert(key("a", col), tile_10kb.clone()).await;
        }

        let stats = cache.stats();
        assert!(stats.evictions > 0);
        assert!(stats.size_bytes <= 1024 * 1024);
        assert_eq!(stats.size_bytes, stats.entry_count * 10 * 1024);
    }

    #[tokio::test]
    async fn test_oversized_tile_is_not_cached() {
        let cache = TileMemoryCache::with_limits(1024, 100, None);
        cache.insert(key("a", 1), Bytes::from(vec![0u8; 4096])).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_replace_tracks_size() {
        let cache = TileMemoryCache::new(100, 1000, None);

        cache.insert(key("a", 1), Bytes::from("hello")).await;
        cache.insert(key("a", 2), Bytes::from("world!")).await;
        assert_eq!(cache.size_bytes(), 11);

        cache.insert(key("a", 1), Bytes::from("hello world")).await;
        assert_eq!(cache.size_bytes(), 17);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_sharding_spreads_keys() {
        let cache = TileMemoryCache::new(100, 10_000, None);
        assert_eq!(cache.shard_count(), MAX_SHARDS);

        for col in 0..512 {
            cache.insert(key("a", col), Bytes::from("x")).await;
        }

        let counts = cache.shard_entry_counts().await;
        assert_eq!(counts.iter().sum::<usize>(), 512);
        assert!(counts.iter().filter(|&&c| c > 0).count() > MAX_SHARDS / 2);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = TileMemoryCache::new(100, 1000, None);
        cache.insert(key("a", 1), Bytes::from("data1")).await;
        cache.insert(key("a", 2), Bytes::from("data2")).await;

        assert_eq!(cache.remove(&key("a", 1)).await, Some(Bytes::from("data1")));
        assert_eq!(cache.len(), 1);

        cache.clear().await;
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[tokio::test]
    async fn test_utilization() {
        let cache = TileMemoryCache::new(16, 1000, None);
        assert_eq!(cache.utilization(), 0.0);

        cache.insert(key("a", 1), Bytes::from(vec![0u8; 512 * 1024])).await;
        let expected = 512.0 / (16.0 * 1024.0);
        assert!((cache.utilization() - expected).abs() < 1e-9);
    }
}
