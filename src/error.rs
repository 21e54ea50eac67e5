use thiserror::Error;

/// Errors produced by pixel sources (file loaders and their stand-ins)
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// No image with this name is known to the catalog
    #[error("Image not found: {0}")]
    NotFound(String),

    /// Requested band/channel does not exist
    #[error("Band out of range: requested {band}, image has {num_bands}")]
    BandOutOfRange { band: usize, num_bands: usize },

    /// Requested pixel rectangle exceeds the image bounds
    #[error("Region out of bounds: {x},{y} {w}x{h} exceeds image {width}x{height}")]
    RegionOutOfBounds {
        x: u64,
        y: u64,
        w: u64,
        h: u64,
        width: u64,
        height: u64,
    },

    /// Underlying storage failure
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors from the tile buffer pool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// All buffers are leased and growth is not permitted
    #[error("Tile pool exhausted: {leased} buffers leased at capacity {capacity}")]
    Exhausted { leased: usize, capacity: usize },
}

/// Errors from the lossy precision codec
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Deflate stream could not be written or finished
    #[error("Compression failed: {0}")]
    Compress(String),

    /// Compressed stream could not be inflated
    #[error("Decompression failed: {0}")]
    Decompress(String),

    /// Inflated byte count does not match the expected sample count
    #[error("Decompressed size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Wire-level protocol errors.
///
/// A frame that fails to parse is rejected outright; no partial state is
/// applied.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is shorter than its declared binary length
    #[error("Truncated frame: declared {declared} binary bytes, frame has {available}")]
    TruncatedFrame { declared: usize, available: usize },

    /// Frame too short to contain the fixed-size prefix
    #[error("Short frame: need at least {required} bytes, got {actual}")]
    ShortFrame { required: usize, actual: usize },

    /// JSON tail failed to parse
    #[error("Invalid JSON metadata: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// NaN run lengths do not sum to the sample count
    #[error("NaN run lengths sum to {sum}, expected {expected} samples")]
    RunLengthMismatch { sum: i64, expected: usize },

    /// Binary section is not a whole number of float32 samples
    #[error("Raw payload length {len} is not a multiple of 4")]
    MisalignedPayload { len: usize },

    /// Codec failure while decoding the compressed payload
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors that can occur while serving a region request
#[derive(Debug, Error)]
pub enum RegionError {
    /// Loader failure
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Buffer pool failure
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// Codec failure
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// No image has been loaded in this session
    #[error("No image loaded")]
    NoImageLoaded,

    /// Region parameters are malformed (zero-size, negative, or misaligned)
    #[error("Invalid region: {reason}")]
    InvalidRegion { reason: String },
}
