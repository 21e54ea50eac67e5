//! Lossy fixed-precision float compression.
//!
//! The wire protocol treats the numeric compressor as a pluggable engine
//! selected by an integer precision parameter. Precision values in
//! `[4, 32)` travel the compressed path; anything outside that range means
//! "send raw IEEE-754 float32". The threshold is part of the protocol: the
//! decoder uses it to pick its decode path, so it must never drift.
//!
//! The built-in engine truncates each sample's mantissa to `precision`
//! significant bits, shuffles the byte planes so the zeroed low bytes group
//! together, and DEFLATEs the result. Truncation is toward zero, so the
//! declared error bound is `|v| * 2^-min(precision, 23)`.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::CodecError;

/// Lowest precision value that selects the compressed wire path.
pub const MIN_COMPRESSION_PRECISION: i32 = 4;

/// Lowest precision value that selects the raw wire path (exclusive bound).
pub const MAX_COMPRESSION_PRECISION: i32 = 32;

/// Default precision for region responses.
pub const DEFAULT_PRECISION: i32 = 12;

/// Whether a precision parameter selects the compressed wire path.
///
/// Out-of-range values (including negatives and >= 32) fall back to raw
/// float32 transfer; they are never an error, since the raw path is always
/// valid.
#[inline]
pub fn is_compressed_precision(precision: i32) -> bool {
    (MIN_COMPRESSION_PRECISION..MAX_COMPRESSION_PRECISION).contains(&precision)
}

// =============================================================================
// Codec Trait
// =============================================================================

/// Pluggable lossy 2D float compressor.
///
/// Implementations compress a dense `width x height` float buffer at a
/// given integer precision. Inputs must be NaN-free; the caller runs the
/// NaN run-length encoder first.
pub trait PrecisionCodec: Send + Sync {
    /// Compress `samples` (length `width * height`) at `precision`.
    fn compress(
        &self,
        samples: &[f32],
        width: usize,
        height: usize,
        precision: u32,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decompress back into `width * height` floats.
    fn decompress(
        &self,
        bytes: &[u8],
        width: usize,
        height: usize,
        precision: u32,
    ) -> Result<Vec<f32>, CodecError>;

    /// Maximum absolute error for a sample of the given magnitude.
    fn error_bound(&self, magnitude: f32, precision: u32) -> f32;
}

// =============================================================================
// Built-in Engine
// =============================================================================

/// Mantissa-truncating codec with byte-plane shuffle and DEFLATE.
#[derive(Debug, Clone, Default)]
pub struct ShuffleDeflateCodec;

impl ShuffleDeflateCodec {
    pub fn new() -> Self {
        Self
    }

    /// Number of mantissa bits retained at a given precision.
    #[inline]
    fn kept_bits(precision: u32) -> u32 {
        precision.min(23)
    }

    /// Zero the mantissa bits below the retained width.
    #[inline]
    fn truncate(value: f32, kept: u32) -> f32 {
        let drop = 23 - kept;
        let mask = !((1u32 << drop) - 1);
        f32::from_bits(value.to_bits() & mask)
    }
}

impl PrecisionCodec for ShuffleDeflateCodec {
    fn compress(
        &self,
        samples: &[f32],
        width: usize,
        height: usize,
        precision: u32,
    ) -> Result<Vec<u8>, CodecError> {
        debug_assert_eq!(samples.len(), width * height);
        let kept = Self::kept_bits(precision);
        let n = samples.len();

        // Truncate mantissas, then group the little-endian byte planes:
        // plane 0 holds byte 0 of every sample, and so on. The high planes
        // compress well on smooth data; the truncated low planes are mostly
        // zero.
        let mut shuffled = vec![0u8; n * 4];
        for (i, &v) in samples.iter().enumerate() {
            let bytes = Self::truncate(v, kept).to_le_bytes();
            for plane in 0..4 {
                shuffled[plane * n + i] = bytes[plane];
            }
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder
            .write_all(&shuffled)
            .map_err(|e| CodecError::Compress(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::Compress(e.to_string()))
    }

    fn decompress(
        &self,
        bytes: &[u8],
        width: usize,
        height: usize,
        _precision: u32,
    ) -> Result<Vec<f32>, CodecError> {
        let n = width * height;
        let expected = n * 4;

        let mut shuffled = Vec::with_capacity(expected);
        ZlibDecoder::new(bytes)
            .read_to_end(&mut shuffled)
            .map_err(|e| CodecError::Decompress(e.to_string()))?;

        if shuffled.len() != expected {
            return Err(CodecError::SizeMismatch {
                expected,
                actual: shuffled.len(),
            });
        }

        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            let bytes = [
                shuffled[i],
                shuffled[n + i],
                shuffled[2 * n + i],
                shuffled[3 * n + i],
            ];
            samples.push(f32::from_le_bytes(bytes));
        }
        Ok(samples)
    }

    fn error_bound(&self, magnitude: f32, precision: u32) -> f32 {
        let kept = Self::kept_bits(precision);
        magnitude.abs() * (2.0f32).powi(-(kept as i32))
    }
}
