//! View tracker + coordinator integration tests.
//!
//! Exercises the full client-side loop: gestures mutate the tracker, the
//! debouncer settles, the coordinator decides whether to fetch, and served
//! responses update the current region.

use std::time::{Duration, Instant};

use cube_streamer::codec::wire::{RegionReadAck, RegionReadRequest};
use cube_streamer::view::{
    CurrentRegion, Debouncer, RegionRequestCoordinator, ViewStateTracker, GESTURE_DEBOUNCE,
};

const BAND: i32 = 0;
const COMPRESSION: i32 = 12;

/// Answer a request the way the server would: ack extents count decimated
/// samples, and the coordinator rescales them on receipt.
fn serve(coordinator: &mut RegionRequestCoordinator, request: &RegionReadRequest) {
    let mip = request.mip.max(1) as i64;
    let ack = RegionReadAck {
        success: true,
        x: request.x,
        y: request.y,
        w: request.w / mip,
        h: request.h / mip,
        mip: request.mip,
        band: request.band,
        compression: request.compression,
        hist: None,
    };
    coordinator.apply_response(CurrentRegion::from_ack(&ack));
}

#[test]
fn test_pan_beyond_served_region_fetches_once_at_same_mip() {
    // Viewer at zoom 1.0 over a 4096x4096 image, 1024x1024 canvas
    let mut tracker = ViewStateTracker::new(4096, 4096, 1024, 1024);
    tracker.set_zoom(1.0);
    let mut coordinator = RegionRequestCoordinator::new();

    let bounds = tracker.bounds();
    let first = coordinator
        .evaluate(&bounds, tracker.zoom(), BAND, COMPRESSION)
        .expect("initial view always fetches");
    assert_eq!(first.mip, 1);
    serve(&mut coordinator, &first);

    // Pan 50 screen pixels right: bounds shift by 50 / zoom image pixels
    tracker.pan(50.0, 0.0);
    let panned = tracker.bounds();
    assert_eq!(panned.x, bounds.x + 50);
    assert_eq!(panned.y, bounds.y);

    // The shifted rectangle exceeds the served width, so exactly one new
    // request goes out, with mip unchanged
    let second = coordinator
        .evaluate(&panned, tracker.zoom(), BAND, COMPRESSION)
        .expect("pan past the served edge must refetch");
    assert_eq!(second.mip, first.mip);
    assert_eq!(second.x, panned.x);
    serve(&mut coordinator, &second);

    // Re-evaluating the same view is now a no-op
    assert!(coordinator
        .evaluate(&panned, tracker.zoom(), BAND, COMPRESSION)
        .is_none());
}

#[test]
fn test_small_pan_inside_served_region_is_free() {
    let mut tracker = ViewStateTracker::new(4096, 4096, 512, 512);
    tracker.set_zoom(1.0);
    let mut coordinator = RegionRequestCoordinator::new();

    // Serve a superset region around the initial view
    let bounds = tracker.bounds();
    serve(
        &mut coordinator,
        &RegionReadRequest {
            band: BAND,
            x: bounds.x - 128,
            y: bounds.y - 128,
            w: bounds.w + 256,
            h: bounds.h + 256,
            mip: 1,
            compression: COMPRESSION,
        },
    );

    // Wander within the margin: never a fetch
    for (dx, dy) in [(30.0, 0.0), (-60.0, 40.0), (10.0, -70.0)] {
        tracker.pan(dx, dy);
        assert!(
            coordinator
                .evaluate(&tracker.bounds(), tracker.zoom(), BAND, COMPRESSION)
                .is_none(),
            "pan ({}, {}) should stay inside the served region",
            dx,
            dy
        );
    }
}

#[test]
fn test_zoom_in_past_served_mip_refetches() {
    let mut tracker = ViewStateTracker::new(4096, 4096, 512, 512);
    tracker.set_zoom(0.5); // mip 2
    let mut coordinator = RegionRequestCoordinator::new();

    let first = coordinator
        .evaluate(&tracker.bounds(), tracker.zoom(), BAND, COMPRESSION)
        .unwrap();
    assert_eq!(first.mip, 2);
    serve(&mut coordinator, &first);

    // Zooming in to 1:1 needs finer data even though the view shrinks
    tracker.set_zoom(1.0);
    let second = coordinator
        .evaluate(&tracker.bounds(), tracker.zoom(), BAND, COMPRESSION)
        .unwrap();
    assert_eq!(second.mip, 1);
}

#[test]
fn test_wheel_zoom_storm_settles_into_one_evaluation() {
    let mut tracker = ViewStateTracker::new(4096, 4096, 512, 512);
    tracker.set_zoom(1.0);
    let mut debouncer = Debouncer::default();
    let t0 = Instant::now();

    // 10 wheel ticks, 50ms apart: each retriggers the quiet period
    let mut fired = 0;
    for i in 0..10 {
        let now = t0 + Duration::from_millis(50 * i);
        tracker.zoom_by(0.9);
        debouncer.trigger(now);
        if debouncer.fire_due(now) {
            fired += 1;
        }
    }
    assert_eq!(fired, 0);

    // Quiet period elapses after the last tick
    let settle = t0 + Duration::from_millis(50 * 9) + GESTURE_DEBOUNCE;
    assert!(debouncer.fire_due(settle));
    assert!(!debouncer.fire_due(settle + Duration::from_millis(1)));

    // One evaluation for the whole gesture
    let coordinator = RegionRequestCoordinator::new();
    let request = coordinator
        .evaluate(&tracker.bounds(), tracker.zoom(), BAND, COMPRESSION)
        .unwrap();
    // 0.9^10 ≈ 0.349 -> 1/zoom ≈ 2.87 -> mip 3
    assert_eq!(request.mip, 3);
}
