//! Bundle parsing errors

use crate::dbobject::DbError;
use thiserror::Error;

/// Errors raised while reading a bundle body
#[derive(Debug, Error)]
pub enum BundleError {
    /// Legacy dbx encoding
    #[error("dbx-mode bundles are not supported")]
    DbxMode,

    /// Manifest magic is neither ebx nor dbx mode
    #[error("invalid bundle manifest magic: 0x{0:08X}")]
    InvalidMagic(u32),

    /// Per-kind counts disagree with the total
    #[error("manifest lists {listed} records but declares {total}")]
    CountMismatch {
        /// Declared total
        total: u32,
        /// Sum of ebx, res and chunk counts
        listed: u64,
    },

    /// A manifest section extends past the manifest
    #[error("manifest section {section} ends at {end}, past manifest size {manifest_size}")]
    SectionOutOfBounds {
        /// Section name
        section: &'static str,
        /// End offset relative to the manifest header
        end: u64,
        /// Declared manifest size
        manifest_size: u64,
    },

    /// Record name offset lies outside the text block
    #[error("name offset {offset} outside text block of {text_size} bytes")]
    NameOutOfBounds {
        /// Offset into the text block
        offset: u32,
        /// Text block size
        text_size: usize,
    },

    /// Record name is not valid UTF-8 or not NUL-terminated
    #[error("malformed record name at text offset {0}")]
    InvalidName(u32),

    /// Stream ends inside a section
    #[error("truncated {section}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Section being read
        section: &'static str,
        /// Bytes required
        expected: u64,
        /// Bytes available
        actual: u64,
    },

    /// Content-addressed body holds no document
    #[error("content-addressed bundle body is empty")]
    EmptyBody,

    /// Malformed document
    #[error("document error: {0}")]
    Document(#[from] DbError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing/writing error
    #[error("binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for bundle operations
pub type BundleResult<T> = std::result::Result<T, BundleError>;
