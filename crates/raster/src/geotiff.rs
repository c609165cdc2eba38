//! GeoTIFF implementation of the decode capability.
//!
//! Opening a file reads only its header and model tags. Pixel data is decoded
//! chunk by chunk (strips or tiles) when a window needs it, and the most
//! recently used chunks are kept as 8-bit interleaved samples. Georeferencing
//! comes from the standard GeoTIFF model tags; only geographic (degree based)
//! model spaces are accepted.

use crate::resample::{column_indices, row_indices};
use crate::{DatasetInfo, RasterDataset, RasterDecoder, RasterError, Result};
use lru::LruCache;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tiff::decoder::{ChunkType, Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;
use wmts_common::{GeoBoundingBox, PixelBuffer, PixelLayout};

const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const MODEL_TYPE_PROJECTED: u16 = 1;

/// PlanarConfiguration value for band-separated storage.
const PLANAR_SEPARATE: u16 = 2;

/// Decoded chunks kept per dataset.
pub const CHUNK_CACHE_CAPACITY: usize = 64;

/// Opens GeoTIFF files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffDecoder;

impl RasterDecoder for GeoTiffDecoder {
    fn open(&self, path: &Path) -> Result<Arc<dyn RasterDataset>> {
        Ok(Arc::new(GeoTiffDataset::open(path)?))
    }
}

/// Strip or tile grid of the image.
#[derive(Debug, Clone, Copy)]
struct ChunkLayout {
    kind: ChunkType,
    width: u32,
    height: u32,
    across: u32,
}

impl ChunkLayout {
    /// Chunk holding source pixel `(col, row)` and the pixel's offset inside it.
    fn locate(&self, col: u32, row: u32) -> (u32, u32, u32) {
        let index = (row / self.height) * self.across + col / self.width;
        (index, col % self.width, row % self.height)
    }
}

/// One decoded chunk, interleaved 8-bit samples.
struct Chunk {
    width: u32,
    samples: Vec<u8>,
}

/// An open GeoTIFF whose pixels are read on demand.
pub struct GeoTiffDataset {
    path: PathBuf,
    info: DatasetInfo,
    layout: ChunkLayout,
    decoder: Mutex<Decoder<BufReader<File>>>,
    chunks: Mutex<LruCache<u32, Arc<Chunk>>>,
}

impl GeoTiffDataset {
    /// Open a GeoTIFF file and read its georeferencing.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| RasterError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // Tile offset tables of large orthophotos exceed the default IFD limit
        let mut limits = Limits::default();
        limits.ifd_value_size = 64 * 1024 * 1024;

        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| decode_error(path, e))?
            .with_limits(limits);

        let (width, height) = decoder.dimensions().map_err(|e| decode_error(path, e))?;
        let color_type = decoder.colortype().map_err(|e| decode_error(path, e))?;
        let bands = band_count(color_type).ok_or_else(|| RasterError::UnsupportedColorType {
            path: path.to_path_buf(),
            color_type: format!("{:?}", color_type),
        })?;

        let planar = decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)
            .map_err(|e| decode_error(path, e))?;
        if planar == Some(PLANAR_SEPARATE) {
            return Err(RasterError::UnsupportedLayout(path.to_path_buf()));
        }

        check_model_type(&mut decoder, path)?;
        let extent = read_extent(&mut decoder, width, height, path)?;

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        if chunk_width == 0 || chunk_height == 0 {
            return Err(RasterError::InvalidDimensions {
                width: chunk_width,
                height: chunk_height,
            });
        }
        let layout = ChunkLayout {
            kind: decoder.get_chunk_type(),
            width: chunk_width,
            height: chunk_height,
            across: width.div_ceil(chunk_width),
        };

        debug!(
            path = %path.display(),
            width,
            height,
            bands,
            chunk_type = ?layout.kind,
            chunk_width,
            chunk_height,
            extent = %extent,
            "Opened GeoTIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info: DatasetInfo {
                width,
                height,
                bands,
                extent,
            },
            layout,
            decoder: Mutex::new(decoder),
            chunks: Mutex::new(LruCache::new(
                NonZeroUsize::new(CHUNK_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    /// Number of decoded chunks currently held.
    pub fn cached_chunks(&self) -> usize {
        lock(&self.chunks).len()
    }

    /// Fetch chunk `index`, decoding it on a cache miss.
    fn chunk(&self, index: u32) -> Result<Arc<Chunk>> {
        if let Some(chunk) = lock(&self.chunks).get(&index) {
            return Ok(chunk.clone());
        }

        let (width, height, data) = {
            let mut decoder = lock(&self.decoder);
            let (width, height) = decoder.chunk_data_dimensions(index);
            let data = decoder
                .read_chunk(index)
                .map_err(|e| decode_error(&self.path, e))?;
            (width, height, data)
        };

        let samples = to_u8_samples(data);
        let expected = width as usize * height as usize * self.info.bands;
        if samples.len() < expected {
            return Err(RasterError::InvalidWindow {
                expected,
                actual: samples.len(),
            });
        }

        let chunk = Arc::new(Chunk { width, samples });
        lock(&self.chunks).put(index, chunk.clone());
        Ok(chunk)
    }
}

impl std::fmt::Debug for GeoTiffDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTiffDataset")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("layout", &self.layout)
            .finish()
    }
}

impl RasterDataset for GeoTiffDataset {
    fn info(&self) -> &DatasetInfo {
        &self.info
    }

    fn read_window(&self, bbox: &GeoBoundingBox, width: u32, height: u32) -> Result<PixelBuffer> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }

        let bands = self.info.bands;
        let cols = column_indices(&self.info, bbox, width);
        let rows = row_indices(&self.info, bbox, height);

        let mut output = PixelBuffer::filled(width, height, bands, PixelLayout::Planar, 0);
        let plane = output.pixel_count();

        // Chunks of the current chunk row; rows arrive north to south
        let mut current_row = None;
        let mut local: HashMap<u32, Arc<Chunk>> = HashMap::new();

        for (out_y, src_row) in rows.iter().enumerate() {
            let Some(src_row) = *src_row else { continue };
            let chunk_row = src_row / self.layout.height;
            if current_row != Some(chunk_row) {
                local.clear();
                current_row = Some(chunk_row);
            }

            for (out_x, src_col) in cols.iter().enumerate() {
                let Some(src_col) = *src_col else { continue };
                let (index, x, y) = self.layout.locate(src_col, src_row);
                if !local.contains_key(&index) {
                    local.insert(index, self.chunk(index)?);
                }
                let Some(chunk) = local.get(&index) else { continue };

                let src = (y as usize * chunk.width as usize + x as usize) * bands;
                let pixel = out_y * width as usize + out_x;
                for band in 0..bands {
                    output.data[band * plane + pixel] = chunk.samples[src + band];
                }
            }
        }

        Ok(output)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn decode_error(path: &Path, source: tiff::TiffError) -> RasterError {
    RasterError::Decode {
        path: path.to_path_buf(),
        source,
    }
}

/// Samples per pixel for the colour types the decoder can normalise.
fn band_count(color_type: ColorType) -> Option<usize> {
    match color_type {
        ColorType::Gray(_) => Some(1),
        ColorType::GrayA(_) => Some(2),
        ColorType::RGB(_) => Some(3),
        ColorType::RGBA(_) => Some(4),
        _ => None,
    }
}

/// Reject rasters whose GeoKey directory declares a projected model space.
fn check_model_type<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<()> {
    let Ok(keys) = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag) else {
        return Ok(());
    };

    // Header is four shorts, followed by (KeyID, TIFFTagLocation, Count, Value) entries
    let projected = keys
        .get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .any(|entry| {
            entry[0] == GT_MODEL_TYPE_GEO_KEY && entry[1] == 0 && entry[3] == MODEL_TYPE_PROJECTED
        });

    if projected {
        return Err(RasterError::UnsupportedProjection(path.to_path_buf()));
    }
    Ok(())
}

/// Read the geographic extent from the model tags.
fn read_extent<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
    path: &Path,
) -> Result<GeoBoundingBox> {
    let (width, height) = (width as f64, height as f64);
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
    let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 && scale[0] > 0.0 && scale[1] > 0.0 {
            // Tiepoint format: [i, j, k, x, y, z], raster (i, j) sits at model (x, y)
            let west = tiepoint[3] - tiepoint[0] * scale[0];
            let north = tiepoint[4] + tiepoint[1] * scale[1];
            return Ok(GeoBoundingBox::from_edges(
                west,
                north - height * scale[1],
                west + width * scale[0],
                north,
            ));
        }
    }

    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        // Row-major 4x4 affine; rotation/shear terms must be zero
        if m.len() >= 16 && m[1] == 0.0 && m[4] == 0.0 && m[0] > 0.0 && m[5] < 0.0 {
            let (west, north) = (m[3], m[7]);
            return Ok(GeoBoundingBox::from_edges(
                west,
                north + height * m[5],
                west + width * m[0],
                north,
            ));
        }
    }

    Err(RasterError::MissingGeoreference(PathBuf::from(path)))
}

/// Normalise decoded samples to 8 bits.
///
/// 16-bit unsigned data keeps its high byte; every other type is clamped to
/// `0..=255`.
fn to_u8_samples(result: DecodingResult) -> Vec<u8> {
    fn clamp<T: Into<f64>>(v: T) -> u8 {
        v.into().clamp(0.0, 255.0) as u8
    }

    match result {
        DecodingResult::U8(data) => data,
        DecodingResult::U16(data) => data.into_iter().map(|v| (v >> 8) as u8).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v.min(255) as u8).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v.min(255) as u8).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v.max(0) as u8).collect(),
        DecodingResult::I16(data) => data.into_iter().map(clamp).collect(),
        DecodingResult::I32(data) => data.into_iter().map(clamp).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v.clamp(0, 255) as u8).collect(),
        DecodingResult::F32(data) => data.into_iter().map(clamp).collect(),
        DecodingResult::F64(data) => data.into_iter().map(|v| v.clamp(0.0, 255.0) as u8).collect(),
    }
}
