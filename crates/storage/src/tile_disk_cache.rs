//! Optional on-disk tier for encoded tiles.
//!
//! Tiles are stored flat in one directory as `{layer}_{z}_{x}_{y}.jpeg`.
//! Writes go to a temporary file first and are renamed into place, so a
//! reader never sees a partially written tile. The number of files is bounded;
//! the least recently used tile is deleted when the bound is reached.
//!
//! The directory is emptied of tiles when the cache is opened, so nothing
//! written by a previous process is ever served.

use bytes::Bytes;
use lru::LruCache;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wmts_common::TileKey;

const TILE_EXTENSION: &str = "jpeg";
const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Error)]
pub enum DiskCacheError {
    #[error("Disk cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Disk cache needs room for at least one tile")]
    ZeroCapacity,
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> DiskCacheError + '_ {
    move |source| DiskCacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Point-in-time statistics for the disk tier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileDiskCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub entry_count: u64,
}

/// Bounded directory of encoded tiles.
pub struct TileDiskCache {
    dir: PathBuf,
    max_entries: usize,
    /// Tiles currently on disk, in recency order.
    index: Mutex<LruCache<TileKey, ()>>,
    temp_counter: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

impl TileDiskCache {
    /// Open (creating if needed) `dir` as a cache of at most `max_entries` tiles.
    ///
    /// Tile and temporary files already in the directory are deleted.
    pub async fn open(dir: impl Into<PathBuf>, max_entries: usize) -> Result<Self, DiskCacheError> {
        if max_entries == 0 {
            return Err(DiskCacheError::ZeroCapacity);
        }

        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;
        let removed = clear_tiles(&dir).await?;

        info!(
            dir = %dir.display(),
            max_entries,
            removed_stale = removed,
            "Disk tile cache ready"
        );

        Ok(Self {
            dir,
            max_entries,
            index: Mutex::new(LruCache::unbounded()),
            temp_counter: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Path a tile is stored under.
    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read a tile if this cache wrote it and it is still on disk.
    pub async fn get(&self, key: &TileKey) -> Result<Option<Bytes>, DiskCacheError> {
        let known = self.index.lock().await.get(key).is_some();
        if !known {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let path = self.tile_path(key);
        match fs::read(&path).await {
            Ok(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(Bytes::from(data)))
            }
            // Evicted between the index check and the read
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.index.lock().await.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Write a tile, deleting least recently used tiles past the bound.
    pub async fn put(&self, key: &TileKey, data: &Bytes) -> Result<(), DiskCacheError> {
        let path = self.tile_path(key);
        let temp = self.dir.join(format!(
            "{}.{}.{}",
            key.file_name(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed),
            TEMP_EXTENSION
        ));

        if let Err(e) = fs::write(&temp, data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(io_error(&temp)(e));
        }
        fs::rename(&temp, &path).await.map_err(io_error(&path))?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        let victims = {
            let mut index = self.index.lock().await;
            index.put(key.clone(), ());
            let mut victims = Vec::new();
            while index.len() > self.max_entries {
                match index.pop_lru() {
                    Some((victim, ())) => victims.push(victim),
                    None => break,
                }
            }
            victims
        };

        for victim in victims {
            let victim_path = self.tile_path(&victim);
            match fs::remove_file(&victim_path).await {
                Ok(()) => {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!(tile = %victim, "Evicted tile from disk cache");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %victim_path.display(),
                    error = %e,
                    "Failed to delete evicted tile"
                ),
            }
        }

        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> TileDiskCacheStats {
        TileDiskCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.len().await as u64,
        }
    }
}

/// Delete tile and temporary files directly inside `dir`.
async fn clear_tiles(dir: &Path) -> Result<usize, DiskCacheError> {
    let mut entries = fs::read_dir(dir).await.map_err(io_error(dir))?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await.map_err(io_error(dir))? {
        let path = entry.path();
        let is_tile = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == TILE_EXTENSION || ext == TEMP_EXTENSION);
        if is_tile && entry.file_type().await.map_err(io_error(&path))?.is_file() {
            fs::remove_file(&path).await.map_err(io_error(&path))?;
            removed += 1;
        }
    }

    Ok(removed)
}
