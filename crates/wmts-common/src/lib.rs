//! Common types shared by the GeoTIFF WMTS crates.

pub mod bbox;
pub mod error;
pub mod layer;
pub mod pixel;
pub mod tile;

pub use bbox::{GeoBoundingBox, LatLon};
pub use error::TileAddressError;
pub use layer::{LayerMetadata, Resolution};
pub use pixel::{PixelBuffer, PixelLayout};
pub use tile::{tile_to_bounds, TileAddress, TileKey, MAX_ZOOM};
