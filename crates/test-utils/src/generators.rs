//! Synthetic GeoTIFF generators.
//!
//! These write small, fully predictable rasters so decoding, cropping and
//! encoding can be verified against known colours.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tiff::TiffResult;

/// How the synthetic file is georeferenced.
#[derive(Debug, Clone, Copy)]
pub enum Georef {
    /// ModelTiepoint + ModelPixelScale for `(west, south, east, north)`
    Tiepoint((f64, f64, f64, f64)),
    /// ModelTransformation matrix for `(west, south, east, north)`
    Transformation((f64, f64, f64, f64)),
    /// Tiepoint georeferencing plus a GeoKey directory declaring a projected model
    Projected((f64, f64, f64, f64)),
    /// No model tags at all
    None,
}

/// Creates an interleaved RGB pixel vector of a single colour.
///
/// # Example
///
/// ```
/// use test_utils::solid_rgb;
///
/// let pixels = solid_rgb(2, 2, [1, 2, 3]);
/// assert_eq!(pixels, vec![1, 2, 3, 1, 2, 3, 1, 2, 3, 1, 2, 3]);
/// ```
pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    color.repeat(width as usize * height as usize)
}

/// Creates an interleaved RGB image split into four coloured quadrants.
///
/// Colours are ordered north-west, north-east, south-west, south-east.
pub fn quadrant_rgb(width: u32, height: u32, colors: [[u8; 3]; 4]) -> Vec<u8> {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for row in 0..height {
        for col in 0..width {
            let east = (col >= width / 2) as usize;
            let south = (row >= height / 2) as usize;
            data.extend_from_slice(&colors[south * 2 + east]);
        }
    }
    data
}

/// Writes a GeoTIFF of colour type `C` with the given georeferencing.
pub fn write_geotiff<C: ColorType>(
    path: &Path,
    width: u32,
    height: u32,
    data: &[C::Inner],
    georef: Georef,
) -> TiffResult<()>
where
    [C::Inner]: TiffValue,
{
    write_striped_geotiff::<C>(path, width, height, data, georef, None)
}

/// Like [`write_geotiff`], with an explicit number of rows per strip.
///
/// `None` keeps the encoder's default strip size.
pub fn write_striped_geotiff<C: ColorType>(
    path: &Path,
    width: u32,
    height: u32,
    data: &[C::Inner],
    georef: Georef,
    rows_per_strip: Option<u32>,
) -> TiffResult<()>
where
    [C::Inner]: TiffValue,
{
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let mut image = encoder.new_image::<C>(width, height)?;
    if let Some(rows) = rows_per_strip {
        image.rows_per_strip(rows)?;
    }

    let tiepoint_tags = |(west, south, east, north): (f64, f64, f64, f64)| {
        let scale = [(east - west) / width as f64, (north - south) / height as f64, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, west, north, 0.0];
        (scale, tiepoint)
    };

    match georef {
        Georef::Tiepoint(extent) => {
            let (scale, tiepoint) = tiepoint_tags(extent);
            image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
            image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
        }
        Georef::Transformation((west, south, east, north)) => {
            let sx = (east - west) / width as f64;
            let sy = (north - south) / height as f64;
            let matrix = [
                sx, 0.0, 0.0, west, //
                0.0, -sy, 0.0, north, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ];
            image.encoder().write_tag(Tag::ModelTransformationTag, &matrix[..])?;
        }
        Georef::Projected(extent) => {
            let (scale, tiepoint) = tiepoint_tags(extent);
            image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
            image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
            // Version 1.1.0, one key: GTModelTypeGeoKey = ModelTypeProjected
            let keys: [u16; 8] = [1, 1, 0, 1, 1024, 0, 1, 1];
            image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
        }
        Georef::None => {}
    }

    image.write_data(data)
}

/// Writes an 8-bit RGB GeoTIFF of a single colour.
pub fn write_solid_rgb_geotiff(
    path: &Path,
    width: u32,
    height: u32,
    extent: (f64, f64, f64, f64),
    color: [u8; 3],
) -> TiffResult<()> {
    write_geotiff::<colortype::RGB8>(
        path,
        width,
        height,
        &solid_rgb(width, height, color),
        Georef::Tiepoint(extent),
    )
}

/// Creates a scratch directory for rasters written by a test.
pub fn temp_raster_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("geotiff-wmts-test")
        .tempdir()
        .expect("failed to create temporary raster directory")
}
