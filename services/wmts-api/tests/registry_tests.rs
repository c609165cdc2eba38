//! Layer discovery against real GeoTIFF files, and serving tiles from them.

mod common;

use image::GenericImageView;
use raster::GeoTiffDecoder;
use std::fs;
use test_utils::fixtures::{color, extent};
use test_utils::{temp_raster_dir, write_solid_rgb_geotiff};
use wmts_api::{LayerRegistry, RegistryError};

fn extensions() -> Vec<String> {
    vec!["tif".to_string(), "tiff".to_string()]
}

fn discover(root: &std::path::Path) -> Result<LayerRegistry, RegistryError> {
    LayerRegistry::discover(root, &extensions(), &GeoTiffDecoder, color::WHITE)
}

fn assert_color_near(actual: [u8; 3], expected: [u8; 3]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (*a as i32 - e as i32).abs() <= 8,
            "{:?} is not close to {:?}",
            actual,
            expected
        );
    }
}

#[test]
fn test_discovers_nested_files_sorted_by_name() {
    let dir = temp_raster_dir();
    fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
    write_solid_rgb_geotiff(&dir.path().join("zulu.tif"), 64, 32, extent::WORLD, color::RED).unwrap();
    write_solid_rgb_geotiff(
        &dir.path().join("nested/alpha.tiff"),
        20,
        20,
        extent::EUROPE_10DEG,
        color::GREEN,
    )
    .unwrap();
    write_solid_rgb_geotiff(
        &dir.path().join("nested/deeper/mike.TIF"),
        16,
        16,
        extent::ZURICH,
        color::BLUE,
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not a raster").unwrap();
    fs::write(dir.path().join("nested/preview.png"), "ignored").unwrap();

    let registry = discover(dir.path()).unwrap();

    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["alpha", "mike", "zulu"]);

    let layers = registry.list_all();
    assert_eq!(layers.len(), 3);
    let alpha = &layers[0];
    assert_eq!(alpha.name, "alpha");
    assert_eq!((alpha.width, alpha.height), (20, 20));
    assert_eq!(alpha.band_count, 3);
    assert!((alpha.extent.west() - 5.0).abs() < 1e-9);
    assert!((alpha.extent.north() - 50.0).abs() < 1e-9);
    assert!((alpha.resolution.x - 0.5).abs() < 1e-9);
}

#[test]
fn test_duplicate_stems_fail() {
    let dir = temp_raster_dir();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    write_solid_rgb_geotiff(&dir.path().join("a/ortho.tif"), 8, 8, extent::WORLD, color::RED).unwrap();
    write_solid_rgb_geotiff(&dir.path().join("b/ortho.tiff"), 8, 8, extent::WORLD, color::BLUE).unwrap();

    let err = discover(dir.path()).unwrap_err();
    match err {
        RegistryError::DuplicateLayer { name, first, second } => {
            assert_eq!(name, "ortho");
            assert_ne!(first, second);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_root() {
    let dir = temp_raster_dir();
    let missing = dir.path().join("does-not-exist");

    assert!(matches!(discover(&missing), Err(RegistryError::RootNotFound(_))));
}

#[test]
fn test_unreadable_file_fails_startup() {
    let dir = temp_raster_dir();
    write_solid_rgb_geotiff(&dir.path().join("good.tif"), 8, 8, extent::WORLD, color::RED).unwrap();
    fs::write(dir.path().join("broken.tif"), b"definitely not a tiff").unwrap();

    match discover(dir.path()).unwrap_err() {
        RegistryError::Open { name, .. } => assert_eq!(name, "broken"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_empty_root_yields_empty_registry() {
    let dir = temp_raster_dir();
    let registry = discover(dir.path()).unwrap();
    assert!(registry.is_empty());
    assert!(registry.list_all().is_empty());
}

#[tokio::test]
async fn test_serves_tiles_from_geotiff() {
    let dir = temp_raster_dir();
    write_solid_rgb_geotiff(&dir.path().join("world.tif"), 360, 170, extent::WORLD, color::OCHRE)
        .unwrap();
    write_solid_rgb_geotiff(
        &dir.path().join("northeast.tif"),
        180,
        90,
        extent::NORTH_EAST,
        color::GREEN,
    )
    .unwrap();

    let resolver = common::resolver(discover(dir.path()).unwrap());

    let tile = resolver.resolve_tile("world", 2, 1, 1).await.unwrap();
    let decoded = image::load_from_memory(&tile).unwrap();
    assert_eq!(decoded.dimensions(), (256, 256));
    assert_color_near(decoded.to_rgb8().get_pixel(100, 100).0, color::OCHRE);

    // Tile 1/1/0 is exactly the north-east quadrant
    let tile = resolver.resolve_tile("northeast", 1, 1, 0).await.unwrap();
    let decoded = image::load_from_memory(&tile).unwrap().to_rgb8();
    assert_color_near(decoded.get_pixel(128, 128).0, color::GREEN);

    // Tile 0/0/0 covers the whole world; the western half is outside the layer
    let tile = resolver.resolve_tile("northeast", 0, 0, 0).await.unwrap();
    let decoded = image::load_from_memory(&tile).unwrap().to_rgb8();
    assert_color_near(decoded.get_pixel(32, 200).0, color::WHITE);
    assert_color_near(decoded.get_pixel(200, 60).0, color::GREEN);

    // Tile 1/0/1 lies entirely outside the layer
    let err = resolver.resolve_tile("northeast", 1, 0, 1).await.unwrap_err();
    assert_eq!(err.http_status_code(), 400);
}
