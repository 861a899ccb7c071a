//! DbObject error types

use thiserror::Error;

/// DbObject parsing and lookup errors
#[derive(Debug, Error)]
pub enum DbError {
    /// Tag byte carries a type code this reader does not know
    #[error("unknown DbObject type 0x{tag:02X} at offset {offset}")]
    UnknownType {
        /// Raw tag byte
        tag: u8,
        /// Stream offset of the tag
        offset: u64,
    },

    /// Nesting exceeded the reader limit
    #[error("DbObject nesting deeper than {0} levels")]
    DepthExceeded(usize),

    /// LEB128 value did not terminate within 10 bytes
    #[error("invalid LEB128 value at offset {0}")]
    InvalidLeb128(u64),

    /// Declared size runs past the end of the input
    #[error("size {size} at offset {offset} exceeds the {available} bytes available")]
    SizeOutOfBounds {
        /// Stream offset of the sized value
        offset: u64,
        /// Declared size
        size: u64,
        /// Bytes remaining in the input
        available: u64,
    },

    /// Container children did not consume exactly the declared size
    #[error("container at offset {offset} declared {declared} bytes but used {actual}")]
    SizeMismatch {
        /// Stream offset of the container content
        offset: u64,
        /// Declared content size
        declared: u64,
        /// Bytes actually consumed
        actual: u64,
    },

    /// End marker found where a value was required
    #[error("unexpected end marker at offset {0}")]
    UnexpectedEnd(u64),

    /// Entry name ran off the end of the input without a terminator
    #[error("unterminated entry name at offset {0}")]
    UnterminatedName(u64),

    /// String or name is not valid UTF-8
    #[error("invalid UTF-8 at offset {0}")]
    InvalidUtf8(u64),

    /// Document root is not the expected container
    #[error("document root is {0}, expected an object")]
    RootNotObject(&'static str),

    /// Required field is absent
    #[error("missing field '{0}'")]
    MissingField(String),

    /// Field holds a different type than required
    #[error("field '{field}' is {found}, expected {expected}")]
    UnexpectedType {
        /// Field name
        field: String,
        /// Expected type name
        expected: &'static str,
        /// Actual type name
        found: &'static str,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for DbObject operations
pub type DbResult<T> = Result<T, DbError>;
