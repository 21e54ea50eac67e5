//! Region service: the server-side pipeline for `region_read`.
//!
//! A region request names a rectangle of one band at a decimation factor
//! (mip). The service decomposes the rectangle into tiles on the decimated
//! grid, satisfies each tile from the image's cache or by reading through
//! the pixel source into a pooled buffer, assembles the dense sample
//! buffer, computes its histogram, compresses it if the precision parameter
//! asks for that, and frames the response for the wire.
//!
//! Tiles are cached per open image: [`RegionService::open`] pairs a pixel
//! source with its own [`TileCache`] and [`TilePool`], so sessions viewing
//! different images never see each other's pixels and a `fileload` in one
//! session cannot evict another session's warm tiles.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::codec::precision::{is_compressed_precision, PrecisionCodec, ShuffleDeflateCodec};
use crate::codec::wire::{Histogram, RegionFrame, RegionPayload, RegionReadAck, RegionReadRequest};
use crate::codec::nan_rle;
use crate::error::RegionError;
use crate::image::PixelSource;

use super::cache::{Tile, TileCache, TileCacheKey};
use super::pool::{TilePool, TILE_AREA, TILE_SIZE};

/// Spare pool buffers beyond the cache capacity, so a tile can always be
/// loaded before anything is evicted.
pub const POOL_HEADROOM: usize = 4;

/// Default tile cache capacity per open image, in tiles.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// An open image: the pixel source plus its private tile cache and pool.
///
/// The cache sits behind a write-preferring `RwLock`. Cache hits go through
/// `peek` under the read lock, so concurrent hits proceed in parallel; the
/// write lock is taken only briefly to promote recency, insert a freshly
/// read tile, or reset on a band change, and waiting writers cannot starve
/// behind a stream of readers.
pub struct OpenImage {
    source: Arc<dyn PixelSource>,
    cache: RwLock<TileCache>,
    pool: Arc<TilePool>,
}

impl OpenImage {
    /// The image's pixel source.
    pub fn source(&self) -> &Arc<dyn PixelSource> {
        &self.source
    }

    /// The buffer pool backing this image's tiles.
    pub fn pool(&self) -> &Arc<TilePool> {
        &self.pool
    }

    /// Read-only tile lookup that does not disturb recency order.
    pub async fn peek_tile(&self, key: &TileCacheKey) -> Option<Arc<Tile>> {
        self.cache.read().await.peek(key)
    }

    /// Drop all cached tiles, e.g. on a band change.
    pub async fn reset_cache(&self, band: i32) {
        self.cache.write().await.reset(band);
    }

    /// Raise the cache capacity, growing the pool to match.
    pub async fn set_cache_capacity(&self, capacity: usize) {
        let mut cache = self.cache.write().await;
        let old = cache.capacity();
        cache.resize(capacity);
        let new = cache.capacity();
        if new > old {
            self.pool.grow(new - old);
        }
    }

    /// Current `(resident tiles, capacity)`.
    pub async fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.read().await;
        (cache.len(), cache.capacity())
    }
}

/// Serves region requests against open images.
///
/// Shared across sessions via `Arc`; holds only configuration and the
/// compression engine. Per-image state lives in [`OpenImage`].
pub struct RegionService {
    cache_capacity: usize,
    codec: Arc<dyn PrecisionCodec>,
}

impl RegionService {
    /// Create a service with the default cache capacity and codec.
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a service with a specific per-image tile cache capacity.
    pub fn with_cache_capacity(cache_capacity: usize) -> Self {
        Self::with_codec(cache_capacity, Arc::new(ShuffleDeflateCodec::new()))
    }

    /// Create a service with a custom compression engine.
    pub fn with_codec(cache_capacity: usize, codec: Arc<dyn PrecisionCodec>) -> Self {
        Self {
            cache_capacity,
            codec,
        }
    }

    /// Pair a pixel source with a fresh tile cache and pool.
    ///
    /// Called once per `fileload`; dropping the handle releases the cache
    /// and every pooled buffer with it.
    pub fn open(&self, source: Arc<dyn PixelSource>) -> OpenImage {
        let cache = TileCache::new(self.cache_capacity);
        let pool = TilePool::new(cache.capacity() + POOL_HEADROOM, TILE_AREA);
        OpenImage {
            source,
            cache: RwLock::new(cache),
            pool,
        }
    }

    /// Serve a region request from an open image.
    pub async fn read_region(
        &self,
        image: &OpenImage,
        request: &RegionReadRequest,
    ) -> Result<RegionFrame, RegionError> {
        let (image_w, image_h) = image.source.dimensions();
        let mip = request.mip.max(1) as i64;

        if request.band < 0 || request.band as usize >= image.source.num_bands() {
            return Err(RegionError::Source(
                crate::error::SourceError::BandOutOfRange {
                    band: request.band.max(0) as usize,
                    num_bands: image.source.num_bands(),
                },
            ));
        }
        if request.x < 0 || request.y < 0 {
            return Err(RegionError::InvalidRegion {
                reason: format!("negative origin {},{}", request.x, request.y),
            });
        }

        // Clamp to the image, snap extents down to whole decimated pixels
        let w = request.w.min(image_w as i64 - request.x) / mip * mip;
        let h = request.h.min(image_h as i64 - request.y) / mip * mip;
        if w <= 0 || h <= 0 {
            return Err(RegionError::InvalidRegion {
                reason: format!("empty region {}x{} at mip {}", request.w, request.h, mip),
            });
        }

        // Origin in decimated-grid units
        let x0 = request.x / mip;
        let y0 = request.y / mip;
        let sw = (w / mip) as usize;
        let sh = (h / mip) as usize;

        // Swap the cache to the requested band if it changed
        {
            let mut cache = image.cache.write().await;
            if cache.band() != request.band {
                cache.reset(request.band);
            }
        }

        let mut samples = self
            .assemble(image, request.band as usize, request.mip.max(1), x0, y0, sw, sh)
            .await?;

        let hist = compute_histogram(&samples);

        let payload = if is_compressed_precision(request.compression) {
            let runs = nan_rle::encode_and_fill(&mut samples, sw, sh);
            let bytes = self
                .codec
                .compress(&samples, sw, sh, request.compression as u32)?;
            RegionPayload::Compressed { runs, bytes }
        } else {
            RegionPayload::Raw(samples)
        };

        Ok(RegionFrame {
            ack: RegionReadAck {
                success: true,
                x: x0 * mip,
                y: y0 * mip,
                w: sw as i64,
                h: sh as i64,
                mip: mip as i32,
                band: request.band,
                compression: request.compression,
                hist,
            },
            payload,
        })
    }

    /// Copy the requested decimated rectangle out of cached tiles, loading
    /// missing tiles through the source.
    async fn assemble(
        &self,
        image: &OpenImage,
        band: usize,
        mip: i32,
        x0: i64,
        y0: i64,
        sw: usize,
        sh: usize,
    ) -> Result<Vec<f32>, RegionError> {
        let tile_size = TILE_SIZE as i64;
        let tx0 = x0 / tile_size;
        let tx1 = (x0 + sw as i64 - 1) / tile_size;
        let ty0 = y0 / tile_size;
        let ty1 = (y0 + sh as i64 - 1) / tile_size;

        let mut out = vec![f32::NAN; sw * sh];

        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                let tile = self.fetch_tile(image, band, mip, tx as i32, ty as i32).await?;

                // Intersection of this tile with the output rectangle, in
                // decimated-grid coordinates
                let gx0 = (tx * tile_size).max(x0);
                let gx1 = ((tx + 1) * tile_size).min(x0 + sw as i64);
                let gy0 = (ty * tile_size).max(y0);
                let gy1 = ((ty + 1) * tile_size).min(y0 + sh as i64);

                let data = tile.samples();
                for gy in gy0..gy1 {
                    let src_row = (gy - ty * tile_size) as usize;
                    let src_start = src_row * TILE_SIZE + (gx0 - tx * tile_size) as usize;
                    let dst_start = (gy - y0) as usize * sw + (gx0 - x0) as usize;
                    let len = (gx1 - gx0) as usize;
                    out[dst_start..dst_start + len]
                        .copy_from_slice(&data[src_start..src_start + len]);
                }
            }
        }

        Ok(out)
    }

    /// Get one tile, preferring the cache.
    ///
    /// Hits take only the read lock (plus a brief write lock to mark
    /// recency), so concurrent hits on warm tiles proceed in parallel.
    async fn fetch_tile(
        &self,
        image: &OpenImage,
        band: usize,
        mip: i32,
        tile_x: i32,
        tile_y: i32,
    ) -> Result<Arc<Tile>, RegionError> {
        let key = TileCacheKey::for_mip(tile_x, tile_y, mip);

        // The layer mapping is not injective, so a hit must also match mip
        let cached = {
            let cache = image.cache.read().await;
            cache.peek(&key).filter(|t| t.mip == mip)
        };
        if let Some(tile) = cached {
            image.cache.write().await.touch(&key);
            return Ok(tile);
        }

        let mut buf = image.pool.pull()?;
        image
            .source
            .read_tile(band, mip, tile_x, tile_y, &mut buf)
            .await?;
        let tile = Arc::new(Tile::new(mip, buf));

        let mut cache = image.cache.write().await;
        cache.insert(key, Arc::clone(&tile));
        Ok(tile)
    }

    /// Per-image tile cache capacity new images are opened with.
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    /// The compression engine used for region payloads.
    pub fn codec(&self) -> &Arc<dyn PrecisionCodec> {
        &self.codec
    }
}

impl Default for RegionService {
    fn default() -> Self {
        Self::new()
    }
}

/// Histogram over the finite samples of a region.
///
/// Bin count follows the square-root rule with a floor of 2. Returns `None`
/// when nothing is finite.
pub fn compute_histogram(samples: &[f32]) -> Option<Histogram> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut finite = 0usize;
    for &v in samples {
        if v.is_finite() {
            finite += 1;
            min = min.min(v);
            max = max.max(v);
        }
    }
    if finite == 0 {
        return None;
    }

    let n = ((samples.len() as f32).sqrt().max(2.0)) as u32;
    let bin_width = if max > min {
        (max - min) / n as f32
    } else {
        1.0
    };

    let mut bins = vec![0u32; n as usize];
    for &v in samples {
        if v.is_finite() {
            let idx = (((v - min) / bin_width) as usize).min(n as usize - 1);
            bins[idx] += 1;
        }
    }

    Some(Histogram {
        n,
        first_bin_center: min + bin_width / 2.0,
        bin_width,
        bins,
    })
}
