//! Geographic bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A geographic rectangle described by its upper-left and lower-right corners.
///
/// Coordinates are WGS84 degrees. The upper-left corner carries the northern
/// latitude and western longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBox {
    pub upper_left: LatLon,
    pub lower_right: LatLon,
}

impl GeoBoundingBox {
    /// Create a bounding box from its two corners.
    pub fn new(upper_left: LatLon, lower_right: LatLon) -> Self {
        Self {
            upper_left,
            lower_right,
        }
    }

    /// Create a bounding box from its four edges.
    pub fn from_edges(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            upper_left: LatLon::new(north, west),
            lower_right: LatLon::new(south, east),
        }
    }

    pub fn north(&self) -> f64 {
        self.upper_left.lat
    }

    pub fn south(&self) -> f64 {
        self.lower_right.lat
    }

    pub fn west(&self) -> f64 {
        self.upper_left.lon
    }

    pub fn east(&self) -> f64 {
        self.lower_right.lon
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.east() - self.west()
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.north() - self.south()
    }

    /// True when the box has a positive area.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// Check if this bbox overlaps another with a non-zero area.
    pub fn intersects(&self, other: &GeoBoundingBox) -> bool {
        self.west() < other.east()
            && self.east() > other.west()
            && self.south() < other.north()
            && self.north() > other.south()
    }
}

impl std::fmt::Display for GeoBoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}] -> [{:.6}, {:.6}]",
            self.upper_left.lat, self.upper_left.lon, self.lower_right.lat, self.lower_right.lon
        )
    }
}
