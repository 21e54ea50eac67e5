//! Websocket protocol integration tests.
//!
//! Drives a viewer session with the JSON frames a browser client would send
//! and checks the binary region frames that come back.

use cube_streamer::codec::wire::{decode_frame, decode_region, RegionPayload};
use cube_streamer::error::ProtocolError;
use cube_streamer::server::Outbound;
use cube_streamer::view::{CurrentRegion, RegionRequestCoordinator};
use cube_streamer::{PrecisionCodec, ShuffleDeflateCodec};

use super::test_utils::{gradient_source, session_over};

fn region_read_json(band: i32, x: i64, y: i64, w: i64, h: i64, mip: i32, compression: i32) -> String {
    format!(
        r#"{{"event":"region_read","message":{{"band":{},"x":{},"y":{},"w":{},"h":{},"mip":{},"compression":{}}}}}"#,
        band, x, y, w, h, mip, compression
    )
}

#[tokio::test]
async fn test_raw_region_round_trip_is_bit_exact() {
    let mut session = session_over("cube.fits", gradient_source(1024, 1024, 1), 64);
    session
        .handle_text(r#"{"event":"fileload","message":{"filename":"cube.fits"}}"#)
        .await
        .unwrap();

    let reply = session
        .handle_text(&region_read_json(0, 100, 200, 300, 150, 1, 0))
        .await
        .unwrap();
    let bytes = match reply {
        Outbound::Binary(b) => b,
        other => panic!("expected binary frame, got {:?}", other),
    };

    let frame = decode_frame(&bytes).unwrap();
    assert!(frame.ack.success);
    assert_eq!((frame.ack.x, frame.ack.y), (100, 200));
    assert_eq!((frame.ack.w, frame.ack.h), (300, 150));

    match &frame.payload {
        RegionPayload::Raw(samples) => {
            // value = x + y * 0.5 at full resolution
            for (i, &v) in samples.iter().enumerate() {
                let x = 100 + (i % 300) as i64;
                let y = 200 + (i / 300) as i64;
                assert_eq!(v, x as f32 + y as f32 * 0.5, "sample {}", i);
            }
        }
        _ => panic!("precision 0 must be raw"),
    }
}

#[tokio::test]
async fn test_compressed_region_within_error_bound() {
    let mut session = session_over("cube.fits", gradient_source(1024, 1024, 1), 64);
    session
        .handle_text(r#"{"event":"fileload","message":{"filename":"cube.fits"}}"#)
        .await
        .unwrap();

    let precision = 8;
    let reply = session
        .handle_text(&region_read_json(0, 0, 0, 512, 512, 2, precision))
        .await
        .unwrap();
    let bytes = match reply {
        Outbound::Binary(b) => b,
        other => panic!("expected binary frame, got {:?}", other),
    };

    let frame = decode_frame(&bytes).unwrap();
    assert!(matches!(frame.payload, RegionPayload::Compressed { .. }));

    let codec = ShuffleDeflateCodec::new();
    let restored = decode_region(&frame, &codec).unwrap();
    assert_eq!(restored.len(), 256 * 256);

    // Spot-check against decimated source values; mip-2 sample (sx, sy)
    // is the mean of a 2x2 block
    for &(sx, sy) in &[(0usize, 0usize), (10, 0), (100, 200), (255, 255)] {
        let x = (sx * 2) as f32;
        let y = (sy * 2) as f32;
        // mean of {x, x+1} + 0.5 * mean of {y, y+1}
        let expected = (x + 0.5) + (y + 0.5) * 0.5;
        let got = restored[sy * 256 + sx];
        let bound = codec.error_bound(expected, precision as u32).max(1e-3);
        assert!(
            (got - expected).abs() <= bound,
            "sample ({},{}): got {} expected {} bound {}",
            sx,
            sy,
            got,
            expected,
            bound
        );
    }
}

#[tokio::test]
async fn test_histogram_in_json_tail() {
    let mut session = session_over("cube.fits", gradient_source(512, 512, 1), 64);
    session
        .handle_text(r#"{"event":"fileload","message":{"filename":"cube.fits"}}"#)
        .await
        .unwrap();

    let reply = session
        .handle_text(&region_read_json(0, 0, 0, 256, 256, 1, 12))
        .await
        .unwrap();
    let bytes = match reply {
        Outbound::Binary(b) => b,
        _ => panic!("expected binary frame"),
    };
    let frame = decode_frame(&bytes).unwrap();
    let hist = frame.ack.hist.expect("histogram");
    assert_eq!(hist.bins.iter().sum::<u32>(), 256 * 256);
    assert_eq!(hist.bins.len(), hist.n as usize);
}

#[test]
fn test_truncated_frame_rejected() {
    // Declares 100 binary bytes but carries none
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&100u32.to_le_bytes());
    bytes.extend_from_slice(br#"{"event":"region_read","message":{}}"#);

    match decode_frame(&bytes) {
        Err(ProtocolError::TruncatedFrame { declared, .. }) => assert_eq!(declared, 100),
        other => panic!("expected TruncatedFrame, got {:?}", other),
    }
}

#[test]
fn test_short_frame_rejected() {
    assert!(matches!(
        decode_frame(&[0u8, 1]),
        Err(ProtocolError::ShortFrame { .. })
    ));
}

#[tokio::test]
async fn test_ack_feeds_coordinator_at_full_resolution() {
    let mut session = session_over("cube.fits", gradient_source(4096, 4096, 1), 64);
    session
        .handle_text(r#"{"event":"fileload","message":{"filename":"cube.fits"}}"#)
        .await
        .unwrap();

    let reply = session
        .handle_text(&region_read_json(0, 0, 0, 1024, 1024, 2, 12))
        .await
        .unwrap();
    let bytes = match reply {
        Outbound::Binary(b) => b,
        _ => panic!("expected binary frame"),
    };
    let frame = decode_frame(&bytes).unwrap();
    assert_eq!((frame.ack.w, frame.ack.h), (512, 512));

    // Served extents come back in decimated samples; the coordinator needs
    // them rescaled to image pixels to dedup follow-up views correctly
    let region = CurrentRegion::from_ack(&frame.ack);
    assert_eq!((region.w, region.h), (1024, 1024));

    let mut coord = RegionRequestCoordinator::new();
    coord.apply_response(region);
    let inside = cube_streamer::Bounds {
        x: 100,
        y: 100,
        w: 800,
        h: 800,
    };
    assert!(coord.evaluate(&inside, 0.5, 0, 12).is_none());
    let outside = cube_streamer::Bounds {
        x: 600,
        y: 600,
        w: 800,
        h: 800,
    };
    assert!(coord.evaluate(&outside, 0.5, 0, 12).is_some());
}

#[tokio::test]
async fn test_band_selects_different_data() {
    let mut session = session_over("cube.fits", gradient_source(512, 512, 3), 64);
    session
        .handle_text(r#"{"event":"fileload","message":{"filename":"cube.fits"}}"#)
        .await
        .unwrap();

    let mut first_samples = Vec::new();
    for band in [0, 2] {
        let reply = session
            .handle_text(&region_read_json(band, 0, 0, 64, 64, 1, 0))
            .await
            .unwrap();
        let bytes = match reply {
            Outbound::Binary(b) => b,
            _ => panic!("expected binary frame"),
        };
        let frame = decode_frame(&bytes).unwrap();
        assert_eq!(frame.ack.band, band);
        match frame.payload {
            RegionPayload::Raw(samples) => first_samples.push(samples[0]),
            _ => panic!("expected raw payload"),
        }
    }
    // Bands are offset by 1000 in the gradient fixture
    assert_eq!(first_samples[1] - first_samples[0], 2000.0);
}
