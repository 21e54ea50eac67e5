//! Test utilities for integration tests.
//!
//! Provides a tracking pixel source that counts tile reads, for verifying
//! cache behavior, plus helpers for building sessions over synthetic images.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use cube_streamer::error::SourceError;
use cube_streamer::image::{ArraySource, MemoryCatalog, PixelSource};
use cube_streamer::server::ViewerSession;
use cube_streamer::tile::RegionService;

// =============================================================================
// Tracking Pixel Source
// =============================================================================

/// Wraps a pixel source and counts every tile read that reaches it.
#[derive(Debug)]
pub struct TrackingSource {
    inner: ArraySource,
    read_count: Arc<AtomicUsize>,
}

impl TrackingSource {
    pub fn new(inner: ArraySource) -> Self {
        Self {
            inner,
            read_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle onto the counter that survives moving the source into an `Arc`.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.read_count)
    }
}

#[async_trait]
impl PixelSource for TrackingSource {
    fn dimensions(&self) -> (u64, u64) {
        self.inner.dimensions()
    }

    fn num_bands(&self) -> usize {
        self.inner.num_bands()
    }

    async fn read_tile(
        &self,
        band: usize,
        mip: i32,
        tile_x: i32,
        tile_y: i32,
        out: &mut [f32],
    ) -> Result<(), SourceError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.inner.read_tile(band, mip, tile_x, tile_y, out).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// A deterministic gradient image: `value = x + y * 0.5`.
pub fn gradient_source(width: u64, height: u64, num_bands: usize) -> ArraySource {
    let bands = (0..num_bands)
        .map(|b| {
            (0..width * height)
                .map(|i| (i % width) as f32 + (i / width) as f32 * 0.5 + b as f32 * 1000.0)
                .collect()
        })
        .collect();
    ArraySource::new(width, height, bands)
}

/// A ready-to-use session over a catalog holding `filename`.
pub fn session_over(filename: &str, source: ArraySource, cache_tiles: usize) -> ViewerSession {
    let mut catalog = MemoryCatalog::new();
    catalog.insert(filename, Arc::new(source));
    ViewerSession::new(
        Arc::new(RegionService::with_cache_capacity(cache_tiles)),
        Arc::new(catalog),
    )
}
