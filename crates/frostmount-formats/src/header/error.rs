//! Header sniffing errors

use thiserror::Error;

/// Errors raised while classifying or unwrapping a document header
#[derive(Debug, Error)]
pub enum HeaderError {
    /// Leading magic matches no known header variant
    #[error("unknown header magic: 0x{0:08X}")]
    UnknownMagic(u32),

    /// Stream ends before the header is complete
    #[error("truncated header: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required by the variant
        expected: u64,
        /// Bytes available
        actual: u64,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing/writing error
    #[error("binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for header operations
pub type HeaderResult<T> = std::result::Result<T, HeaderError>;
