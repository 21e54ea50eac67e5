//! Tile caching and region serving.
//!
//! Tiles are fixed 256x256 sample buffers leased from a [`pool::TilePool`],
//! keyed by position and pyramid layer in an LRU [`cache::TileCache`], and
//! served through [`service::RegionService`].

pub mod cache;
pub mod pool;
pub mod service;

pub use cache::{mip_to_layer, Tile, TileCache, TileCacheKey, MAX_TILE_CACHE_CAPACITY};
pub use pool::{PooledTile, TilePool, TILE_AREA, TILE_SIZE};
pub use service::{compute_histogram, OpenImage, RegionService, DEFAULT_CACHE_CAPACITY, POOL_HEADROOM};
