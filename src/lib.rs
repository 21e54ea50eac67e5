//! # Cube Streamer
//!
//! A region-streaming server for large multi-dimensional astronomical
//! images.
//!
//! Browser viewers connect over a websocket, load an image, and request
//! rectangular regions of one band at an integer decimation factor (mip).
//! The server answers with hybrid binary frames: a binary section carrying
//! the samples (raw float32 or lossy fixed-precision compressed, with NaN
//! positions run-length encoded) followed by a JSON metadata tail.
//!
//! ## Features
//!
//! - **Resolution-matched streaming**: clients request only the decimation
//!   they can display, chosen by the zoom-to-mip rounding rule
//! - **Lossy compression**: fixed-precision float compression with exact
//!   NaN preservation via run-length coding
//! - **Tile caching**: decoded tiles are pooled and LRU-cached server-side,
//!   so panning and animation revisit pixels without re-reading the source
//! - **Request deduplication**: the client-side coordinator skips fetches
//!   whose answer is already covered by the served region
//!
//! ## Architecture
//!
//! - [`codec`] - NaN run-length coding, fixed-precision compression, and
//!   the wire frame layout
//! - [`tile`] - Tile buffer pool, LRU tile cache, and the region service
//! - [`image`] - Pixel source abstraction and the image catalog
//! - [`view`] - Client-side view state, mip selection, and request dedup
//! - [`server`] - Axum-based websocket server and per-viewer sessions
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cube_streamer::{
//!     create_router, AppState, ArraySource, MemoryCatalog, RegionService, RouterConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut catalog = MemoryCatalog::new();
//!     catalog.insert("demo.fits", Arc::new(ArraySource::test_pattern(4096, 4096, 4)));
//!
//!     let state = AppState::new(RegionService::with_cache_capacity(1024), Arc::new(catalog));
//!     let router = create_router(state, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3002").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod image;
pub mod server;
pub mod tile;
pub mod view;

// Re-export commonly used types
pub use codec::nan_rle;
pub use codec::precision::{
    is_compressed_precision, PrecisionCodec, ShuffleDeflateCodec, DEFAULT_PRECISION,
    MAX_COMPRESSION_PRECISION, MIN_COMPRESSION_PRECISION,
};
pub use codec::wire::{
    decode_frame, decode_region, encode_frame, EventEnvelope, FileLoadAck, FileLoadRequest,
    Histogram, RegionFrame, RegionPayload, RegionReadAck, RegionReadRequest,
};
pub use config::Config;
pub use error::{CodecError, PoolError, ProtocolError, RegionError, SourceError};
pub use image::{ArraySource, ImageCatalog, MemoryCatalog, PixelSource};
pub use server::{create_router, run_session, AppState, Outbound, RouterConfig, ViewerSession};
pub use tile::{
    mip_to_layer, OpenImage, RegionService, Tile, TileCache, TileCacheKey, TilePool, TILE_SIZE,
};
pub use view::{
    calculate_mip, Bounds, CurrentRegion, Debouncer, RegionRequestCoordinator, ViewStateTracker,
};
