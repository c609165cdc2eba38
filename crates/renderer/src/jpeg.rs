//! JPEG encoding for tile pixel buffers.
//!
//! Accepts grey, RGB or RGBA buffers in either layout. JPEG has no alpha
//! channel, so RGBA input is composited onto a white background first.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use thiserror::Error;
use tracing::trace;
use wmts_common::PixelBuffer;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Cannot encode an empty pixel buffer")]
    EmptyBuffer,

    #[error("Unsupported channel count for JPEG: {0}")]
    UnsupportedChannels(usize),

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Failed to encode JPEG: {0}")]
    Codec(#[from] image::ImageError),
}

/// Stateless JPEG encoder; safe to share between threads.
#[derive(Debug, Clone, Copy)]
pub struct TileEncoder {
    quality: u8,
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl TileEncoder {
    /// Quality is clamped to `1..=100`.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode `pixels` as a baseline JPEG.
    ///
    /// Output is deterministic for a given buffer and quality.
    pub fn encode(&self, pixels: &PixelBuffer) -> Result<Bytes, EncodeError> {
        if pixels.width == 0 || pixels.height == 0 || pixels.data.is_empty() {
            return Err(EncodeError::EmptyBuffer);
        }
        if pixels.data.len() != pixels.expected_len() {
            return Err(EncodeError::BufferSizeMismatch {
                expected: pixels.expected_len(),
                actual: pixels.data.len(),
            });
        }

        let interleaved = pixels.clone().into_interleaved();
        let (data, color_type) = match interleaved.bands {
            1 => (interleaved.data, ColorType::L8),
            3 => (interleaved.data, ColorType::Rgb8),
            4 => (composite_on_white(&interleaved.data), ColorType::Rgb8),
            other => return Err(EncodeError::UnsupportedChannels(other)),
        };

        let mut jpeg_data = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_data, self.quality);
        encoder.encode(&data, pixels.width, pixels.height, color_type)?;

        trace!(
            width = pixels.width,
            height = pixels.height,
            bands = pixels.bands,
            bytes = jpeg_data.len(),
            "Encoded JPEG tile"
        );

        Ok(Bytes::from(jpeg_data))
    }
}

/// Drop alpha by blending each RGBA pixel over white.
fn composite_on_white(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for pixel in rgba.chunks_exact(4) {
        let alpha = pixel[3] as f32 / 255.0;
        for &channel in &pixel[..3] {
            rgb.push((channel as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(TileEncoder::new(0).quality(), 1);
        assert_eq!(TileEncoder::new(250).quality(), 100);
        assert_eq!(TileEncoder::default().quality(), DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn test_composite_on_white() {
        let rgba = [200, 100, 0, 255, 200, 100, 0, 0, 0, 0, 0, 128];
        assert_eq!(
            composite_on_white(&rgba),
            vec![200, 100, 0, 255, 255, 255, 127, 127, 127]
        );
    }
}
