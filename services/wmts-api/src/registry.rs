//! Discovery of raster layers under a root directory.

use raster::{RasterDecoder, RasterError, RasterSource};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;
use wmts_common::LayerMetadata;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Raster root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Failed to scan raster root: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Duplicate layer name '{name}': {first} and {second}")]
    DuplicateLayer {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Failed to open layer '{name}': {source}")]
    Open {
        name: String,
        #[source]
        source: RasterError,
    },
}

/// Name-indexed set of raster layers, immutable once built.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    layers: BTreeMap<String, Arc<RasterSource>>,
}

impl LayerRegistry {
    /// Scan `root` recursively and open every file whose extension matches
    /// one of `extensions` (compared case-insensitively).
    ///
    /// Each layer is named after its file stem. Two files with the same stem
    /// anywhere under `root` are rejected.
    pub fn discover(
        root: &Path,
        extensions: &[String],
        decoder: &dyn RasterDecoder,
        fill: [u8; 3],
    ) -> Result<Self, RegistryError> {
        if !root.is_dir() {
            return Err(RegistryError::RootNotFound(root.to_path_buf()));
        }

        let mut paths: BTreeMap<String, PathBuf> = BTreeMap::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
                continue;
            }
            let Some(name) = entry.path().file_stem().map(|s| s.to_string_lossy().into_owned())
            else {
                continue;
            };

            if let Some(first) = paths.get(&name) {
                return Err(RegistryError::DuplicateLayer {
                    name,
                    first: first.clone(),
                    second: entry.into_path(),
                });
            }
            paths.insert(name, entry.into_path());
        }

        let mut layers = BTreeMap::new();
        for (name, path) in paths {
            let source = RasterSource::open(name.clone(), &path, decoder, fill)
                .map_err(|source| RegistryError::Open {
                    name: name.clone(),
                    source,
                })?;
            info!(
                layer = %name,
                path = %path.display(),
                extent = %source.extent(),
                "Registered layer"
            );
            layers.insert(name, Arc::new(source));
        }

        info!(root = %root.display(), layers = layers.len(), "Layer discovery complete");
        Ok(Self { layers })
    }

    /// Build a registry from already opened sources.
    pub fn from_sources(
        sources: impl IntoIterator<Item = RasterSource>,
    ) -> Result<Self, RegistryError> {
        let mut layers: BTreeMap<String, Arc<RasterSource>> = BTreeMap::new();
        for source in sources {
            if let Some(first) = layers.get(source.name()) {
                return Err(RegistryError::DuplicateLayer {
                    name: source.name().to_string(),
                    first: first.path().to_path_buf(),
                    second: source.path().to_path_buf(),
                });
            }
            layers.insert(source.name().to_string(), Arc::new(source));
        }
        Ok(Self { layers })
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<RasterSource>> {
        self.layers.get(name).cloned()
    }

    /// Metadata of every layer, sorted by name.
    pub fn list_all(&self) -> Vec<LayerMetadata> {
        self.layers.values().map(|source| source.metadata()).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}
