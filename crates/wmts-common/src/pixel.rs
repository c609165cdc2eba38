//! Decoded pixel buffers passed between the raster and encoding stages.

/// Memory order of the samples in a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// Row-major pixels with all bands of a pixel adjacent (`RGBRGB...`).
    Interleaved,
    /// One full row-major plane per band (`RRR...GGG...BBB...`).
    Planar,
}

/// An 8-bit multi-band image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub bands: usize,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, bands: usize, layout: PixelLayout, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bands,
            layout,
            data,
        }
    }

    /// A buffer with every sample set to `value`.
    pub fn filled(width: u32, height: u32, bands: usize, layout: PixelLayout, value: u8) -> Self {
        let len = width as usize * height as usize * bands;
        Self::new(width, height, bands, layout, vec![value; len])
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of samples the dimensions call for.
    pub fn expected_len(&self) -> usize {
        self.pixel_count() * self.bands
    }

    /// Index of band `band` of pixel `pixel` in `data`.
    pub fn sample_index(&self, pixel: usize, band: usize) -> usize {
        match self.layout {
            PixelLayout::Interleaved => pixel * self.bands + band,
            PixelLayout::Planar => band * self.pixel_count() + pixel,
        }
    }

    pub fn sample(&self, pixel: usize, band: usize) -> u8 {
        self.data[self.sample_index(pixel, band)]
    }

    /// Return the buffer in interleaved order, reordering planar data.
    pub fn into_interleaved(self) -> PixelBuffer {
        if self.layout == PixelLayout::Interleaved || self.bands <= 1 {
            return PixelBuffer {
                layout: PixelLayout::Interleaved,
                ..self
            };
        }

        let pixels = self.pixel_count();
        let mut data = vec![0u8; self.data.len()];
        for (band, plane) in self.data.chunks_exact(pixels).enumerate() {
            for (pixel, &value) in plane.iter().enumerate() {
                data[pixel * self.bands + band] = value;
            }
        }

        PixelBuffer {
            data,
            layout: PixelLayout::Interleaved,
            ..self
        }
    }
}
