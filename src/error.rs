use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised by the compression core.
///
/// Configuration errors are raised eagerly at construction time, contract
/// violations indicate a bug in the driving code, and framing errors mean the
/// coded stream cannot be decoded. Quantizer saturation is not an error and
/// is only logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    // Configuration errors
    #[error("quantizer exponent {0} out of range (0..32)")]
    ExponentOutOfRange(u32),
    #[error("quantizer mantissa {0} out of range (0..2048)")]
    MantissaOutOfRange(u32),
    #[error("quantizer guard bit count {0} out of range (0..=7)")]
    GuardOutOfRange(u32),
    #[error("sample range [{lo}, {hi}] is empty")]
    EmptySampleRange { lo: f32, hi: f32 },
    #[error("reconstruction offset {0} outside [-1, 1]")]
    OffsetOutOfRange(f32),
    #[error("bit depth {0} out of range (2..=32)")]
    DepthOutOfRange(u32),
    #[error("block dimension {0} is not a power of two")]
    BlockDimNotPowerOfTwo(usize),
    #[error("maximum block dimension {max} is below the nominal dimension {expected}")]
    BlockDimTooSmall { expected: usize, max: usize },
    #[error("block dimension {0} does not fit the 16-bit parameter field")]
    BlockDimTooLarge(usize),
    #[error("image dimensions contain a zero")]
    EmptyImage,
    #[error("wavelet pass count {0} out of range (0..=32)")]
    WavePassesOutOfRange(u32),

    // Contract violations
    #[error("window {rows}x{cols} at ({row_off}, {col_off}) exceeds parent {parent_rows}x{parent_cols}")]
    WindowOutOfBounds {
        row_off: usize,
        col_off: usize,
        rows: usize,
        cols: usize,
        parent_rows: usize,
        parent_cols: usize,
    },
    #[error("matrix size mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    SizeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },
    #[error("band index {band} out of range for image with {bands} bands")]
    BandOutOfRange { band: usize, bands: usize },

    // Stream framing errors
    #[error("coded stream exhausted")]
    TruncatedStream,
    #[error("bit reader is not byte aligned")]
    Unaligned,
    #[error("unknown reduction algorithm tag {0:#04x}")]
    UnknownReductionTag(u8),
    #[error("reduction algorithm '{0}' is not available")]
    UnsupportedReduction(&'static str),
    #[error("corrupt block stream: {0}")]
    Framing(&'static str),
}
