//! Cache effectiveness integration tests.
//!
//! Tests verify:
//! - Repeated region reads do not re-read source tiles
//! - Coarser-mip panning over cached data stays cheap
//! - Pool buffers are conserved across eviction churn
//! - Hits refresh recency, and open images keep separate caches

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cube_streamer::codec::wire::RegionReadRequest;
use cube_streamer::tile::{RegionService, TILE_SIZE};

use super::test_utils::{gradient_source, TrackingSource};

fn request(x: i64, y: i64, w: i64, h: i64, mip: i32) -> RegionReadRequest {
    RegionReadRequest {
        band: 0,
        x,
        y,
        w,
        h,
        mip,
        compression: 0,
    }
}

#[tokio::test]
async fn test_repeated_reads_hit_cache() {
    let source = TrackingSource::new(gradient_source(2048, 2048, 1));
    let reads = source.counter();
    let service = RegionService::with_cache_capacity(64);
    let image = service.open(Arc::new(source));

    service
        .read_region(&image, &request(0, 0, 1024, 1024, 1))
        .await
        .unwrap();
    let reads_after_first = reads.load(Ordering::SeqCst);
    assert_eq!(reads_after_first, 16); // 4x4 tiles of 256

    // Same region again: all tiles cached
    service
        .read_region(&image, &request(0, 0, 1024, 1024, 1))
        .await
        .unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), reads_after_first);

    // Contained sub-region: still free
    service
        .read_region(&image, &request(300, 300, 400, 400, 1))
        .await
        .unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), reads_after_first);
}

#[tokio::test]
async fn test_pan_only_loads_new_tiles() {
    let source = TrackingSource::new(gradient_source(4096, 4096, 1));
    let reads = source.counter();
    let service = RegionService::with_cache_capacity(128);
    let image = service.open(Arc::new(source));

    let w = 4 * TILE_SIZE as i64;
    service
        .read_region(&image, &request(0, 0, w, w, 1))
        .await
        .unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 16);

    // Shift right by one tile: one new column of 4 tiles
    service
        .read_region(&image, &request(TILE_SIZE as i64, 0, w, w, 1))
        .await
        .unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn test_eviction_churn_conserves_pool_buffers() {
    let source = TrackingSource::new(gradient_source(8192, 8192, 1));
    let service = RegionService::with_cache_capacity(8);
    let image = service.open(Arc::new(source));

    // Sweep far more tiles than the cache holds
    for row in 0..4 {
        for col in 0..8 {
            let x = col * TILE_SIZE as i64;
            let y = row * TILE_SIZE as i64;
            service
                .read_region(&image, &request(x, y, TILE_SIZE as i64, TILE_SIZE as i64, 1))
                .await
                .unwrap();
        }
    }

    // Every evicted tile returned its buffer
    let (len, capacity) = image.cache_stats().await;
    assert_eq!(len, capacity);
    let pool = image.pool();
    assert_eq!(pool.leased_count(), len);
    assert!(pool.leased_count() + pool.free_count() <= pool.capacity());
}

#[tokio::test]
async fn test_cache_hit_refreshes_recency() {
    let source = TrackingSource::new(gradient_source(1024, 256, 1));
    let reads = source.counter();
    let service = RegionService::with_cache_capacity(2);
    let image = service.open(Arc::new(source));

    let tile = TILE_SIZE as i64;
    let tile_at = |col: i64| request(col * tile, 0, tile, tile, 1);

    service.read_region(&image, &tile_at(0)).await.unwrap();
    service.read_region(&image, &tile_at(1)).await.unwrap();
    // Hit on tile 0: must move it ahead of tile 1 in recency
    service.read_region(&image, &tile_at(0)).await.unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 2);

    // Tile 2 evicts tile 1, not the freshly hit tile 0
    service.read_region(&image, &tile_at(2)).await.unwrap();
    service.read_region(&image, &tile_at(0)).await.unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 3);
    service.read_region(&image, &tile_at(1)).await.unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_open_images_have_independent_caches() {
    let service = RegionService::with_cache_capacity(64);

    let source_a = TrackingSource::new(gradient_source(1024, 1024, 1));
    let reads_a = source_a.counter();
    let image_a = service.open(Arc::new(source_a));

    let source_b = TrackingSource::new(gradient_source(1024, 1024, 1));
    let reads_b = source_b.counter();
    let image_b = service.open(Arc::new(source_b));

    let req = request(0, 0, 512, 512, 1);
    service.read_region(&image_a, &req).await.unwrap();
    assert_eq!(reads_a.load(Ordering::SeqCst), 4);

    // Identical coordinates on B must read B's tiles, not reuse A's
    service.read_region(&image_b, &req).await.unwrap();
    assert_eq!(reads_b.load(Ordering::SeqCst), 4);

    // And B's reads did not evict or poison A's cache
    service.read_region(&image_a, &req).await.unwrap();
    assert_eq!(reads_a.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_mip_levels_cached_independently() {
    let source = TrackingSource::new(gradient_source(2048, 2048, 1));
    let reads = source.counter();
    let service = RegionService::with_cache_capacity(64);
    let image = service.open(Arc::new(source));

    service
        .read_region(&image, &request(0, 0, 512, 512, 1))
        .await
        .unwrap();
    let after_full = reads.load(Ordering::SeqCst);

    // Coarser view of the same pixels reads decimated tiles
    service
        .read_region(&image, &request(0, 0, 2048, 2048, 4))
        .await
        .unwrap();
    assert!(reads.load(Ordering::SeqCst) > after_full);
    let after_coarse = reads.load(Ordering::SeqCst);

    // Both stay warm
    service
        .read_region(&image, &request(0, 0, 512, 512, 1))
        .await
        .unwrap();
    service
        .read_region(&image, &request(0, 0, 2048, 2048, 4))
        .await
        .unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), after_coarse);
}

#[tokio::test]
async fn test_band_switch_invalidates_then_reloads() {
    let source = TrackingSource::new(gradient_source(1024, 1024, 2));
    let reads = source.counter();
    let service = RegionService::with_cache_capacity(64);
    let image = service.open(Arc::new(source));

    service
        .read_region(&image, &request(0, 0, 512, 512, 1))
        .await
        .unwrap();
    let after_band0 = reads.load(Ordering::SeqCst);

    let mut band1 = request(0, 0, 512, 512, 1);
    band1.band = 1;
    service.read_region(&image, &band1).await.unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), after_band0 * 2);

    // Coming back to band 0 is a cold start again
    service
        .read_region(&image, &request(0, 0, 512, 512, 1))
        .await
        .unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), after_band0 * 3);
}
