//! Tile image encoding.
//!
//! Turns the RGB pixel buffers produced by the raster crate into the
//! compressed bytes served to map clients.

pub mod jpeg;

pub use jpeg::{EncodeError, TileEncoder, DEFAULT_JPEG_QUALITY};
