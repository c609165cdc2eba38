//! Common test fixtures for geotiff-wmts tests.
//!
//! Extents are `(west, south, east, north)` in WGS84 degrees.

/// Common raster extents for testing.
pub mod extent {
    /// Whole Mercator world
    pub const WORLD: (f64, f64, f64, f64) = (-180.0, -85.0511287798066, 180.0, 85.0511287798066);

    /// North-east quadrant, exactly covering tile 1/1/0
    pub const NORTH_EAST: (f64, f64, f64, f64) = (0.0, 0.0, 180.0, 85.0511287798066);

    /// A 10° square over central Europe
    pub const EUROPE_10DEG: (f64, f64, f64, f64) = (5.0, 40.0, 15.0, 50.0);

    /// A small area over Zürich (about zoom 12 tiles)
    pub const ZURICH: (f64, f64, f64, f64) = (8.4, 47.3, 8.7, 47.45);
}

/// Common colours for solid-colour rasters.
pub mod color {
    pub const RED: [u8; 3] = [220, 30, 30];
    pub const GREEN: [u8; 3] = [30, 200, 60];
    pub const BLUE: [u8; 3] = [40, 60, 210];
    pub const OCHRE: [u8; 3] = [204, 153, 51];
    pub const WHITE: [u8; 3] = [255, 255, 255];
}
