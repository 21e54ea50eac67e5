//! The loader boundary.
//!
//! File-format loaders (FITS, HDF5, and friends) live outside this crate;
//! the region service only needs a way to pull decimated tiles of float
//! samples out of an image band. [`PixelSource`] is that seam, and
//! [`ArraySource`] is the in-memory implementation backing tests and the
//! demo server.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::tile::TILE_SIZE;

/// Format-agnostic access to one multi-band image.
///
/// Implementations are shared across tasks; reads are interior-immutable.
#[async_trait]
pub trait PixelSource: Send + Sync + std::fmt::Debug {
    /// Full-resolution image dimensions `(width, height)` in pixels.
    fn dimensions(&self) -> (u64, u64);

    /// Number of bands (channels) in the image.
    fn num_bands(&self) -> usize;

    /// Read one tile of decimated samples into `out`.
    ///
    /// Tile `(tile_x, tile_y)` at decimation `mip` covers the source
    /// rectangle starting at `(tile_x, tile_y) * TILE_SIZE * mip`, spanning
    /// `TILE_SIZE * mip` pixels per axis. Each output sample is the mean of
    /// its `mip x mip` source block with NaNs excluded; an all-NaN block
    /// stays NaN. `out` has `TILE_SIZE * TILE_SIZE` slots and arrives
    /// NaN-filled, so slots past the image edge are left alone.
    async fn read_tile(
        &self,
        band: usize,
        mip: i32,
        tile_x: i32,
        tile_y: i32,
        out: &mut [f32],
    ) -> Result<(), SourceError>;
}

// =============================================================================
// In-memory source
// =============================================================================

/// A fully in-memory pixel source.
#[derive(Debug)]
pub struct ArraySource {
    width: u64,
    height: u64,
    bands: Vec<Vec<f32>>,
}

impl ArraySource {
    /// Wrap dense per-band sample buffers, each `width * height` long.
    pub fn new(width: u64, height: u64, bands: Vec<Vec<f32>>) -> Self {
        debug_assert!(bands
            .iter()
            .all(|b| b.len() as u64 == width * height));
        Self {
            width,
            height,
            bands,
        }
    }

    /// Deterministic test image: a diagonal ramp with Gaussian peaks, one
    /// peak per band, and a blanked (NaN) corner.
    pub fn test_pattern(width: u64, height: u64, num_bands: usize) -> Self {
        let mut bands = Vec::with_capacity(num_bands);
        for band in 0..num_bands {
            let cx = width as f32 * (band + 1) as f32 / (num_bands + 1) as f32;
            let cy = height as f32 / 2.0;
            let sigma = width.min(height) as f32 / 8.0;

            let mut samples = Vec::with_capacity((width * height) as usize);
            for y in 0..height {
                for x in 0..width {
                    // Blank a corner to exercise the NaN paths
                    if x < width / 16 && y < height / 16 {
                        samples.push(f32::NAN);
                        continue;
                    }
                    let ramp = (x + y) as f32 / (width + height) as f32;
                    let dx = x as f32 - cx;
                    let dy = y as f32 - cy;
                    let peak = (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                    samples.push(ramp + 10.0 * peak);
                }
            }
            bands.push(samples);
        }
        Self::new(width, height, bands)
    }

    #[inline]
    fn sample(&self, band: &[f32], x: u64, y: u64) -> f32 {
        band[(y * self.width + x) as usize]
    }
}

#[async_trait]
impl PixelSource for ArraySource {
    fn dimensions(&self) -> (u64, u64) {
        (self.width, self.height)
    }

    fn num_bands(&self) -> usize {
        self.bands.len()
    }

    async fn read_tile(
        &self,
        band: usize,
        mip: i32,
        tile_x: i32,
        tile_y: i32,
        out: &mut [f32],
    ) -> Result<(), SourceError> {
        let data = self
            .bands
            .get(band)
            .ok_or(SourceError::BandOutOfRange {
                band,
                num_bands: self.bands.len(),
            })?;

        let mip = mip.max(1) as u64;
        let tile_span = TILE_SIZE as u64 * mip;
        let x0 = tile_x.max(0) as u64 * tile_span;
        let y0 = tile_y.max(0) as u64 * tile_span;

        for oy in 0..TILE_SIZE as u64 {
            let sy = y0 + oy * mip;
            if sy >= self.height {
                break;
            }
            for ox in 0..TILE_SIZE as u64 {
                let sx = x0 + ox * mip;
                if sx >= self.width {
                    break;
                }

                // Mean over the mip x mip block, NaNs excluded
                let mut sum = 0.0f32;
                let mut count = 0usize;
                for by in sy..(sy + mip).min(self.height) {
                    for bx in sx..(sx + mip).min(self.width) {
                        let v = self.sample(data, bx, by);
                        if !v.is_nan() {
                            sum += v;
                            count += 1;
                        }
                    }
                }
                if count > 0 {
                    out[(oy * TILE_SIZE as u64 + ox) as usize] = sum / count as f32;
                }
            }
        }

        Ok(())
    }
}
