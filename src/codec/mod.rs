//! Wire and numeric codecs for region streaming.
//!
//! Three layers cooperate to move a region of float samples to the client:
//!
//! - [`nan_rle`]: run-length encodes which samples are missing (NaN), and
//!   fills NaN slots with finite values before lossy compression.
//! - [`precision`]: the pluggable lossy fixed-precision float compressor
//!   and the `[4, 32)` compressed-path threshold.
//! - [`wire`]: the hybrid binary+JSON frame that carries a region response,
//!   plus the JSON message types exchanged on the socket.

pub mod nan_rle;
pub mod precision;
pub mod wire;

pub use precision::{
    is_compressed_precision, PrecisionCodec, ShuffleDeflateCodec, DEFAULT_PRECISION,
    MAX_COMPRESSION_PRECISION, MIN_COMPRESSION_PRECISION,
};
pub use wire::{
    decode_frame, decode_region, encode_frame, EventEnvelope, FileLoadAck, FileLoadRequest,
    Histogram, RegionFrame, RegionPayload, RegionReadAck, RegionReadRequest,
};
