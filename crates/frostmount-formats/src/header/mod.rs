//! Document header variants
//!
//! Layout and table-of-contents files start with a little-endian magic that
//! selects how the DbObject body is stored:
//!
//! | Magic | Variant | Body |
//! |-------|---------|------|
//! | `0x00CED100`, `0x01CED100` | obfuscated | XOR-coded from `0x22C`, key at `0x128` |
//! | `0x03CED100` | signed | 552-byte signature skipped, body at `0x22C` |
//! | first byte `0x81`/`0x82` | plain | body at offset 0 |
//!
//! [`classify`] only repositions the stream. [`read_document_body`] also
//! decodes obfuscated bodies through [`DeobfuscatingReader`].

mod builder;
mod error;

pub use builder::{DEFAULT_KEY, wrap_document_body, wrap_obfuscated};
pub use error::{HeaderError, HeaderResult};

use binrw::BinReaderExt;
use binrw::io::{Read, Seek, SeekFrom};

/// Obfuscated header, first revision
pub const MAGIC_OBFUSCATED_V0: u32 = 0x00CE_D100;
/// Obfuscated header, second revision
pub const MAGIC_OBFUSCATED_V1: u32 = 0x01CE_D100;
/// Signed header
pub const MAGIC_SIGNED: u32 = 0x03CE_D100;
/// Signature block skipped after the signed magic
pub const SIGNATURE_SIZE: u64 = 0x228;
/// Absolute offset of the obfuscation key
pub const KEY_OFFSET: u64 = 0x128;
/// Obfuscation key length
pub const KEY_SIZE: usize = 257;
/// Absolute offset of the document body for obfuscated and signed files
pub const BODY_OFFSET: u64 = 0x22C;
/// Constant folded into every obfuscated byte
pub const XOR_SEED: u8 = 0x7B;

const PLAIN_OBJECT_TAG: u8 = 0x82;
const PLAIN_LIST_TAG: u8 = 0x81;

/// Header variant detected from the leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// XOR-obfuscated body
    Obfuscated,
    /// Body preceded by a signature block
    Signed,
    /// Body starts at offset 0
    Plain,
    /// Unrecognised magic
    Unknown(u32),
}

impl HeaderKind {
    /// Whether the variant can be read
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// Classify the header at the current position and seek to the document body
///
/// For [`HeaderKind::Unknown`] the stream is left just after the magic.
pub fn classify<R: Read + Seek>(reader: &mut R) -> HeaderResult<HeaderKind> {
    let start = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(start))?;
    let available = len.saturating_sub(start);

    if available == 0 {
        return Err(HeaderError::Truncated {
            expected: 1,
            actual: 0,
        });
    }

    let first: u8 = reader.read_le()?;
    if first == PLAIN_OBJECT_TAG || first == PLAIN_LIST_TAG {
        reader.seek(SeekFrom::Start(start))?;
        return Ok(HeaderKind::Plain);
    }

    if available < 4 {
        return Err(HeaderError::Truncated {
            expected: 4,
            actual: available,
        });
    }
    reader.seek(SeekFrom::Start(start))?;
    let magic: u32 = reader.read_le()?;

    let kind = match magic {
        MAGIC_OBFUSCATED_V0 | MAGIC_OBFUSCATED_V1 => HeaderKind::Obfuscated,
        MAGIC_SIGNED => HeaderKind::Signed,
        other => return Ok(HeaderKind::Unknown(other)),
    };

    if available < BODY_OFFSET {
        return Err(HeaderError::Truncated {
            expected: BODY_OFFSET,
            actual: available,
        });
    }
    reader.seek(SeekFrom::Start(start + BODY_OFFSET))?;
    Ok(kind)
}

/// Classify the header and return the decoded document body
///
/// Unknown magic is reported as [`HeaderError::UnknownMagic`]; whether that
/// is fatal is the caller's decision.
pub fn read_document_body<R: Read + Seek>(reader: &mut R) -> HeaderResult<(HeaderKind, Vec<u8>)> {
    let start = reader.stream_position()?;
    let kind = classify(reader)?;

    let mut body = Vec::new();
    match kind {
        HeaderKind::Plain | HeaderKind::Signed => {
            reader.read_to_end(&mut body)?;
        }
        HeaderKind::Obfuscated => {
            reader.seek(SeekFrom::Start(start + KEY_OFFSET))?;
            let mut key = [0u8; KEY_SIZE];
            reader.read_exact(&mut key)?;
            reader.seek(SeekFrom::Start(start + BODY_OFFSET))?;
            DeobfuscatingReader::new(reader, key).read_to_end(&mut body)?;
        }
        HeaderKind::Unknown(magic) => return Err(HeaderError::UnknownMagic(magic)),
    }
    Ok((kind, body))
}

/// Reader that decodes an obfuscated body on the fly
pub struct DeobfuscatingReader<R> {
    inner: R,
    key: [u8; KEY_SIZE],
    index: usize,
}

impl<R: Read> DeobfuscatingReader<R> {
    /// Wrap a reader positioned at the first body byte
    pub const fn new(inner: R, key: [u8; KEY_SIZE]) -> Self {
        Self {
            inner,
            key,
            index: 0,
        }
    }

    /// Unwrap the inner reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for DeobfuscatingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        for byte in &mut buf[..n] {
            *byte ^= self.key[self.index % KEY_SIZE] ^ XOR_SEED;
            self.index += 1;
        }
        Ok(n)
    }
}
