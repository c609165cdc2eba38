//! Nearest-neighbour window sampling.
//!
//! Each output pixel is sampled at its centre: output column `i` of a window
//! `w` pixels wide covers longitude `west + (i + 0.5) / w * width`, and the
//! source pixel containing that point supplies the value. Rows work the same
//! way from the north edge down. Output pixels whose centre falls outside the
//! raster map to `None`.

use crate::DatasetInfo;
use wmts_common::GeoBoundingBox;

/// Source column for every output column of the window.
pub fn column_indices(info: &DatasetInfo, bbox: &GeoBoundingBox, width: u32) -> Vec<Option<u32>> {
    let res_x = info.extent.width() / info.width as f64;
    (0..width)
        .map(|i| {
            let lon = bbox.west() + (i as f64 + 0.5) / width as f64 * bbox.width();
            source_index((lon - info.extent.west()) / res_x, info.width)
        })
        .collect()
}

/// Source row for every output row of the window.
pub fn row_indices(info: &DatasetInfo, bbox: &GeoBoundingBox, height: u32) -> Vec<Option<u32>> {
    let res_y = info.extent.height() / info.height as f64;
    (0..height)
        .map(|j| {
            let lat = bbox.north() - (j as f64 + 0.5) / height as f64 * bbox.height();
            source_index((info.extent.north() - lat) / res_y, info.height)
        })
        .collect()
}

fn source_index(position: f64, len: u32) -> Option<u32> {
    if !position.is_finite() || position < 0.0 {
        return None;
    }
    let index = position.floor() as u64;
    (index < len as u64).then_some(index as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DatasetInfo {
        // 10x10 pixels covering 0..10°E, 0..10°N: one degree per pixel
        DatasetInfo {
            width: 10,
            height: 10,
            bands: 1,
            extent: GeoBoundingBox::from_edges(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn test_identity_window() {
        let info = info();
        let cols = column_indices(&info, &info.extent, 10);
        let rows = row_indices(&info, &info.extent, 10);
        assert_eq!(cols, (0..10).map(Some).collect::<Vec<_>>());
        assert_eq!(rows, (0..10).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_upsampled_window() {
        let info = info();
        // 2°x2° in the north-west corner into 4x4 pixels
        let bbox = GeoBoundingBox::from_edges(0.0, 8.0, 2.0, 10.0);
        assert_eq!(
            column_indices(&info, &bbox, 4),
            vec![Some(0), Some(0), Some(1), Some(1)]
        );
        assert_eq!(
            row_indices(&info, &bbox, 4),
            vec![Some(0), Some(0), Some(1), Some(1)]
        );
    }

    #[test]
    fn test_partial_overlap_yields_none() {
        let info = info();
        // Window straddling the west edge: left half is outside the raster
        let bbox = GeoBoundingBox::from_edges(-2.0, 0.0, 2.0, 10.0);
        let cols = column_indices(&info, &bbox, 4);
        assert_eq!(cols, vec![None, None, Some(0), Some(1)]);
    }
}
