//! Property tests for tile address to geographic bounds conversion.

use wmts_common::tile::matrix_size;
use wmts_common::{tile_to_bounds, TileAddress};

/// Web Mercator tile containing a point, clamped into the matrix.
fn lat_lon_to_tile(lat: f64, lon: f64, zoom: u32) -> (u32, u32) {
    let n = matrix_size(zoom) as f64;
    let max_index = n - 1.0;

    let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, max_index);
    let y = ((1.0 - lat.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0 * n)
        .floor()
        .clamp(0.0, max_index);

    (x as u32, y as u32)
}

/// Columns/rows to probe at a zoom: both edges plus a spread in between.
fn sample_indices(zoom: u32) -> Vec<u32> {
    let n = matrix_size(zoom);
    let mut indices: Vec<u32> = (0..8).map(|i| (n * i / 8) as u32).collect();
    indices.push((n - 1) as u32);
    indices.dedup();
    indices
}

// ============================================================================
// Corner ordering
// ============================================================================

#[test]
fn test_bounds_are_ordered_for_zoom_0_to_20() {
    for zoom in 0..=20 {
        for &col in &sample_indices(zoom) {
            for &row in &sample_indices(zoom) {
                let bbox = tile_to_bounds(zoom, col, row);
                assert!(
                    bbox.upper_left.lat > bbox.lower_right.lat,
                    "latitude not ordered at {}/{}/{}",
                    zoom,
                    col,
                    row
                );
                assert!(
                    bbox.upper_left.lon < bbox.lower_right.lon,
                    "longitude not ordered at {}/{}/{}",
                    zoom,
                    col,
                    row
                );
            }
        }
    }
}

#[test]
fn test_antimeridian_column_ends_at_180() {
    for zoom in 0..=20 {
        let last = (matrix_size(zoom) - 1) as u32;
        let bbox = tile_to_bounds(zoom, last, 0);
        assert_eq!(bbox.lower_right.lon, 180.0);
        assert!(bbox.upper_left.lon < bbox.lower_right.lon);
    }
}

#[test]
fn test_world_tile() {
    let bbox = tile_to_bounds(0, 0, 0);
    assert!((bbox.upper_left.lat - 85.0511).abs() < 1e-4);
    assert!((bbox.upper_left.lon - (-180.0)).abs() < 1e-9);
    assert!((bbox.lower_right.lat - (-85.0511)).abs() < 1e-4);
    assert!((bbox.lower_right.lon - 180.0).abs() < 1e-9);
}

// ============================================================================
// Tiling consistency
// ============================================================================

#[test]
fn test_adjacent_tiles_share_edges() {
    let zoom = 6;
    let a = tile_to_bounds(zoom, 10, 20);
    let right = tile_to_bounds(zoom, 11, 20);
    let below = tile_to_bounds(zoom, 10, 21);

    assert_eq!(a.east(), right.west());
    assert_eq!(a.south(), below.north());
}

#[test]
fn test_children_cover_parent() {
    let parent = tile_to_bounds(4, 5, 6);
    let nw = tile_to_bounds(5, 10, 12);
    let se = tile_to_bounds(5, 11, 13);

    assert!((parent.west() - nw.west()).abs() < 1e-9);
    assert!((parent.north() - nw.north()).abs() < 1e-9);
    assert!((parent.east() - se.east()).abs() < 1e-9);
    assert!((parent.south() - se.south()).abs() < 1e-9);
}

#[test]
fn test_tile_center_maps_back_to_tile() {
    for zoom in [1, 5, 12, 18] {
        for &col in &sample_indices(zoom) {
            let row = col;
            let bbox = tile_to_bounds(zoom, col, row);
            let center_lat = (bbox.north() + bbox.south()) / 2.0;
            let center_lon = (bbox.west() + bbox.east()) / 2.0;
            assert_eq!(lat_lon_to_tile(center_lat, center_lon, zoom), (col, row));
        }
    }
}

#[test]
fn test_known_locations() {
    assert_eq!(lat_lon_to_tile(0.0, 0.0, 0), (0, 0));

    // New York City at zoom 10
    let (col, row) = lat_lon_to_tile(40.7128, -74.0060, 10);
    assert_eq!((col, row), (301, 385));
    let bbox = tile_to_bounds(10, col, row);
    assert!(bbox.west() <= -74.0060 && -74.0060 < bbox.east());
    assert!(bbox.south() <= 40.7128 && 40.7128 < bbox.north());

    // East edge clamps into the last column
    assert_eq!(lat_lon_to_tile(0.0, 180.0, 2).0, 3);
}

#[test]
fn test_validated_address_bounds_match_free_function() {
    let address = TileAddress::new(7, 33, 90).unwrap();
    assert_eq!(address.bounds(), tile_to_bounds(7, 33, 90));
}
