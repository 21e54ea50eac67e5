//! The hybrid binary+JSON region frame.
//!
//! A region response travels as a single binary frame:
//!
//! ```text
//! [binary_length: u32 LE][binary section][UTF-8 JSON tail]
//! ```
//!
//! When the response is compressed (precision in `[4, 32)`), the binary
//! section is itself structured:
//!
//! ```text
//! [run_count: u32 LE][run lengths: i32 LE x run_count][compressed payload]
//! ```
//!
//! When raw, the binary section is the region's float32 samples verbatim.
//! The JSON tail carries the `region_read` acknowledgement; the decoder
//! reads the compression precision out of it to decide which way to parse
//! the binary section. Length mismatches reject the whole frame, so a
//! malformed response can never partially apply to view state.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::nan_rle;
use crate::codec::precision::{is_compressed_precision, PrecisionCodec};
use crate::error::ProtocolError;

// =============================================================================
// Protocol Messages
// =============================================================================

/// Envelope shared by every JSON message on the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event: String,
    pub message: T,
}

/// `region_read` request body sent by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionReadRequest {
    pub band: i32,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub mip: i32,
    pub compression: i32,
}

/// `region_read` acknowledgement carried in the frame's JSON tail.
///
/// `w` and `h` are the *decimated* sample dimensions; the covered image
/// rectangle is `w * mip` by `h * mip` source pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionReadAck {
    pub success: bool,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub mip: i32,
    pub band: i32,
    pub compression: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hist: Option<Histogram>,
}

/// Precomputed histogram for immediate display on the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    #[serde(rename = "N")]
    pub n: u32,
    #[serde(rename = "firstBinCenter")]
    pub first_bin_center: f32,
    #[serde(rename = "binWidth")]
    pub bin_width: f32,
    pub bins: Vec<u32>,
}

/// `fileload` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLoadRequest {
    pub filename: String,
}

/// `fileload` acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLoadAck {
    pub success: bool,
    #[serde(rename = "numBands")]
    pub num_bands: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
}

// =============================================================================
// Region Frame
// =============================================================================

/// Binary section of a region frame, before entropy decode.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionPayload {
    /// Raw float32 samples, NaNs included.
    Raw(Vec<f32>),
    /// NaN run lengths plus the lossy-compressed, NaN-free payload.
    Compressed { runs: Vec<i32>, bytes: Vec<u8> },
}

/// A parsed region frame: acknowledgement metadata plus binary payload.
///
/// Lives for one request/response exchange; only decoded tiles are cached,
/// never the frame itself.
#[derive(Debug, Clone)]
pub struct RegionFrame {
    pub ack: RegionReadAck,
    pub payload: RegionPayload,
}

#[inline]
fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
fn read_i32_le(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Serialize a region frame to wire bytes.
pub fn encode_frame(frame: &RegionFrame) -> Result<Bytes, ProtocolError> {
    let envelope = EventEnvelope {
        event: "region_read".to_string(),
        message: frame.ack.clone(),
    };
    let json = serde_json::to_vec(&envelope)?;

    let binary_length = match &frame.payload {
        RegionPayload::Raw(samples) => samples.len() * 4,
        RegionPayload::Compressed { runs, bytes } => 4 + runs.len() * 4 + bytes.len(),
    };

    let mut out = Vec::with_capacity(4 + binary_length + json.len());
    out.extend_from_slice(&(binary_length as u32).to_le_bytes());

    match &frame.payload {
        RegionPayload::Raw(samples) => {
            for v in samples {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        RegionPayload::Compressed { runs, bytes } => {
            out.extend_from_slice(&(runs.len() as u32).to_le_bytes());
            for run in runs {
                out.extend_from_slice(&run.to_le_bytes());
            }
            out.extend_from_slice(bytes);
        }
    }

    out.extend_from_slice(&json);
    Ok(Bytes::from(out))
}

/// Parse a region frame from wire bytes.
///
/// Rejects short or inconsistent frames without producing a partial result.
pub fn decode_frame(buf: &[u8]) -> Result<RegionFrame, ProtocolError> {
    if buf.len() < 4 {
        return Err(ProtocolError::ShortFrame {
            required: 4,
            actual: buf.len(),
        });
    }

    let binary_length = read_u32_le(&buf[0..4]) as usize;
    if buf.len() < 4 + binary_length {
        return Err(ProtocolError::TruncatedFrame {
            declared: binary_length,
            available: buf.len() - 4,
        });
    }

    let binary = &buf[4..4 + binary_length];
    let envelope: EventEnvelope<RegionReadAck> = serde_json::from_slice(&buf[4 + binary_length..])?;
    let ack = envelope.message;
    let sample_count = (ack.w.max(0) as usize) * (ack.h.max(0) as usize);

    let payload = if is_compressed_precision(ack.compression) {
        if binary.len() < 4 {
            return Err(ProtocolError::ShortFrame {
                required: 4,
                actual: binary.len(),
            });
        }
        let run_count = read_u32_le(&binary[0..4]) as usize;
        let runs_end = 4 + run_count * 4;
        if binary.len() < runs_end {
            return Err(ProtocolError::TruncatedFrame {
                declared: runs_end,
                available: binary.len(),
            });
        }

        let runs: Vec<i32> = (0..run_count)
            .map(|i| read_i32_le(&binary[4 + i * 4..8 + i * 4]))
            .collect();

        if !nan_rle::runs_are_consistent(&runs, sample_count) {
            let sum: i64 = runs.iter().map(|&r| r as i64).sum();
            return Err(ProtocolError::RunLengthMismatch {
                sum,
                expected: sample_count,
            });
        }

        RegionPayload::Compressed {
            runs,
            bytes: binary[runs_end..].to_vec(),
        }
    } else {
        if binary.len() % 4 != 0 {
            return Err(ProtocolError::MisalignedPayload { len: binary.len() });
        }
        if binary.len() / 4 != sample_count {
            return Err(ProtocolError::TruncatedFrame {
                declared: sample_count * 4,
                available: binary.len(),
            });
        }
        let samples = binary
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        RegionPayload::Raw(samples)
    };

    Ok(RegionFrame { ack, payload })
}

/// Decode a parsed frame into a dense float buffer with NaNs restored.
///
/// This is the client-side tail of the pipeline: decompress if needed, then
/// rewrite NaN runs into the buffer.
pub fn decode_region(
    frame: &RegionFrame,
    codec: &dyn PrecisionCodec,
) -> Result<Vec<f32>, ProtocolError> {
    match &frame.payload {
        RegionPayload::Raw(samples) => Ok(samples.clone()),
        RegionPayload::Compressed { runs, bytes } => {
            let w = frame.ack.w.max(0) as usize;
            let h = frame.ack.h.max(0) as usize;
            let mut samples =
                codec.decompress(bytes, w, h, frame.ack.compression.max(0) as u32)?;
            nan_rle::decode(runs, &mut samples);
            Ok(samples)
        }
    }
}
