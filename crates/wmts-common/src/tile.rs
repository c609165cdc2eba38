//! WMTS tile addressing for the Web Mercator (slippy map) pyramid.
//!
//! A tile address is a zoom/column/row triple. At zoom `z` the pyramid is a
//! `2^z × 2^z` grid with row 0 at the north edge and column 0 at 180°W.

use crate::{GeoBoundingBox, LatLon, TileAddressError};
use serde::{Deserialize, Serialize};

/// Highest zoom level accepted by [`TileAddress::new`].
pub const MAX_ZOOM: u32 = 30;

/// A validated tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileAddress {
    /// Zoom level (TileMatrix identifier)
    pub zoom: u32,
    /// Column (x)
    pub col: u32,
    /// Row (y)
    pub row: u32,
}

impl TileAddress {
    /// Validate a raw zoom/column/row triple.
    ///
    /// Values arrive as signed integers from request parsing so that negative
    /// input is reported against the parameter that carried it.
    pub fn new(zoom: i64, col: i64, row: i64) -> Result<Self, TileAddressError> {
        if zoom < 0 {
            return Err(TileAddressError::Negative {
                param: "tilematrix",
                value: zoom,
            });
        }
        if zoom > MAX_ZOOM as i64 {
            return Err(TileAddressError::ZoomTooLarge {
                zoom,
                max: MAX_ZOOM,
            });
        }
        let zoom = zoom as u32;
        let limit = matrix_size(zoom);

        for (param, value) in [("tilecol", col), ("tilerow", row)] {
            if value < 0 {
                return Err(TileAddressError::Negative { param, value });
            }
            if value as u64 >= limit {
                return Err(TileAddressError::OutOfRange {
                    param,
                    value,
                    zoom,
                    limit,
                });
            }
        }

        Ok(Self {
            zoom,
            col: col as u32,
            row: row as u32,
        })
    }

    /// Geographic footprint of this tile.
    pub fn bounds(&self) -> GeoBoundingBox {
        tile_to_bounds(self.zoom, self.col, self.row)
    }
}

impl std::fmt::Display for TileAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Cache key for one rendered tile of one layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub layer: String,
    pub address: TileAddress,
}

impl TileKey {
    pub fn new(layer: impl Into<String>, address: TileAddress) -> Self {
        Self {
            layer: layer.into(),
            address,
        }
    }

    /// File name used when the tile is persisted to disk.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.jpeg",
            self.layer, self.address.zoom, self.address.col, self.address.row
        )
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.layer, self.address)
    }
}

/// Number of tiles along each axis at `zoom`.
pub fn matrix_size(zoom: u32) -> u64 {
    1u64 << zoom
}

/// Longitude of the western edge of column `col`.
fn col_to_lon(zoom: u32, col: u64) -> f64 {
    let n = matrix_size(zoom) as f64;
    col as f64 / n * 360.0 - 180.0
}

/// Latitude of the northern edge of row `row`.
fn row_to_lat(zoom: u32, row: u64) -> f64 {
    let n = matrix_size(zoom) as f64;
    (std::f64::consts::PI * (1.0 - 2.0 * row as f64 / n))
        .sinh()
        .atan()
        .to_degrees()
}

/// Convert a Web Mercator tile address to its WGS84 bounds.
///
/// The upper-left corner is the north-west corner of the tile, the lower-right
/// corner is the north-west corner of tile `(col + 1, row + 1)`. Zoom 0 covers
/// the whole Mercator world, roughly ±85.0511° latitude.
pub fn tile_to_bounds(zoom: u32, col: u32, row: u32) -> GeoBoundingBox {
    let (col, row) = (col as u64, row as u64);
    GeoBoundingBox::new(
        LatLon::new(row_to_lat(zoom, row), col_to_lon(zoom, col)),
        LatLon::new(row_to_lat(zoom, row + 1), col_to_lon(zoom, col + 1)),
    )
}
