//! LRU cache for decoded region tiles.
//!
//! One cache serves one image session. Tiles hold pooled sample buffers, so
//! evicting an entry returns its buffer to the [`TilePool`](super::TilePool)
//! once the last outstanding reference drops.
//!
//! # Concurrency
//!
//! The cache itself is a plain single-owner structure. Each open image's
//! service handle wraps its cache in `tokio::sync::RwLock`, which is
//! write-preferring: readers queue behind a waiting writer, so eviction and
//! insertion cannot starve behind a stream of cache-hit reads during
//! animation playback. [`TileCache::peek`] is the read-lock path hits go
//! through; `get`, `touch`, `insert` and `reset` need the write lock
//! because they mutate recency order.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::pool::PooledTile;

/// Hard upper limit on cache capacity, in tiles.
pub const MAX_TILE_CACHE_CAPACITY: usize = 4096;

/// Map a decimation factor to its cache layer: `floor(log2(mip))`.
///
/// Monotonic but not injective (mip 2 and 3 share layer 1), so cache hits
/// additionally compare the tile's recorded mip.
#[inline]
pub fn mip_to_layer(mip: i32) -> u32 {
    (mip.max(1) as u32).ilog2()
}

// =============================================================================
// Cache Key
// =============================================================================

/// Identity of a tile: integer tile coordinates at a cache layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Tile X coordinate (0-indexed from left, in tile units)
    pub x: i32,

    /// Tile Y coordinate (0-indexed from top, in tile units)
    pub y: i32,

    /// Cache layer derived from the mip level
    pub layer: u32,
}

impl TileCacheKey {
    pub fn new(x: i32, y: i32, layer: u32) -> Self {
        Self { x, y, layer }
    }

    /// Key for tile coordinates at a given mip level.
    pub fn for_mip(x: i32, y: i32, mip: i32) -> Self {
        Self::new(x, y, mip_to_layer(mip))
    }
}

// =============================================================================
// Tile
// =============================================================================

/// A decoded tile: a pooled sample buffer plus the mip it was decimated at.
#[derive(Debug)]
pub struct Tile {
    /// Decimation factor the samples were produced at
    pub mip: i32,

    data: PooledTile,
}

impl Tile {
    pub fn new(mip: i32, data: PooledTile) -> Self {
        Self { mip, data }
    }

    /// The tile's decoded samples.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// Bounded LRU store of tiles for one image session.
///
/// Eviction removes the least-recently-touched entry first; entries touched
/// simultaneously fall back to insertion order. Capacity `0` degenerates to
/// "no caching": every lookup misses and inserts are dropped, which keeps
/// the fetch/decode path identical with caching disabled.
pub struct TileCache {
    entries: Option<LruCache<TileCacheKey, Arc<Tile>>>,
    band: i32,
}

impl TileCache {
    /// Create a cache holding up to `capacity` tiles (clamped to
    /// [`MAX_TILE_CACHE_CAPACITY`]).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Self::make_entries(capacity),
            band: 0,
        }
    }

    fn make_entries(capacity: usize) -> Option<LruCache<TileCacheKey, Arc<Tile>>> {
        NonZeroUsize::new(capacity.min(MAX_TILE_CACHE_CAPACITY)).map(LruCache::new)
    }

    /// Retrieve a tile and mark it most recently used.
    pub fn get(&mut self, key: &TileCacheKey) -> Option<Arc<Tile>> {
        self.entries.as_mut()?.get(key).cloned()
    }

    /// Retrieve a tile without touching recency order.
    ///
    /// The service hit path reads through this under the shared lock and
    /// promotes recency separately; diagnostics use it to avoid perturbing
    /// eviction order at all.
    pub fn peek(&self, key: &TileCacheKey) -> Option<Arc<Tile>> {
        self.entries.as_ref()?.peek(key).cloned()
    }

    /// Mark a tile most recently used without retrieving it.
    pub fn touch(&mut self, key: &TileCacheKey) {
        if let Some(entries) = self.entries.as_mut() {
            entries.promote(key);
        }
    }

    /// Insert a tile, evicting the least-recently-touched entry if full.
    pub fn insert(&mut self, key: TileCacheKey, tile: Arc<Tile>) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(key, tile);
        }
    }

    /// Drop all entries and switch to a new band/channel.
    ///
    /// Called when the underlying image or the requested band changes;
    /// cached tiles from the previous band would otherwise collide with the
    /// new band's keys.
    pub fn reset(&mut self, band: i32) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
        self.band = band;
    }

    /// The band the cached tiles belong to.
    pub fn band(&self) -> i32 {
        self.band
    }

    /// Change the cache capacity, dropping all entries.
    pub fn resize(&mut self, capacity: usize) {
        self.entries = Self::make_entries(capacity);
    }

    /// Number of resident tiles.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity in tiles.
    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.cap().get())
    }
}
