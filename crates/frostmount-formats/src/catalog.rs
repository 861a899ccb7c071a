//! CAS catalog (`Data/cas.cat`)
//!
//! 16-byte ASCII signature followed by fixed 32-byte little-endian entries
//! locating content by SHA-1 inside the numbered `cas_XX.cas` archives.

use binrw::io::Cursor;
use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use thiserror::Error;

use crate::FrostFormat;
use crate::keys::Sha1;

/// Catalog file signature
pub const CATALOG_MAGIC: &[u8; 16] = b"NyanNyanNyanNyan";
/// Size of one catalog entry
pub const ENTRY_SIZE: usize = 32;

/// Errors raised while reading a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Signature mismatch
    #[error("invalid catalog signature: {0:02X?}")]
    InvalidMagic(Vec<u8>),

    /// Entry table is not a whole number of entries
    #[error("catalog entry table has {0} trailing bytes")]
    TrailingBytes(usize),

    /// `BinRW` parsing/writing error
    #[error("binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// One catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct CatalogEntry {
    /// Content digest
    pub sha1: Sha1,
    /// Byte offset inside the archive
    pub offset: u32,
    /// Byte size
    pub size: u32,
    /// Archive number (`cas_XX.cas`)
    pub cas_index: u32,
}

/// Parsed catalog
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CasCatalog {
    /// Entries in file order
    pub entries: Vec<CatalogEntry>,
}

impl CasCatalog {
    /// Parse a catalog
    pub fn read(data: &[u8]) -> CatalogResult<Self> {
        if data.len() < CATALOG_MAGIC.len() || &data[..CATALOG_MAGIC.len()] != CATALOG_MAGIC {
            return Err(CatalogError::InvalidMagic(
                data[..data.len().min(CATALOG_MAGIC.len())].to_vec(),
            ));
        }

        let table = &data[CATALOG_MAGIC.len()..];
        let trailing = table.len() % ENTRY_SIZE;
        if trailing != 0 {
            return Err(CatalogError::TrailingBytes(trailing));
        }

        let mut cursor = Cursor::new(table);
        let entries = (0..table.len() / ENTRY_SIZE)
            .map(|_| cursor.read_le::<CatalogEntry>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Serialize the catalog
    pub fn write(&self) -> CatalogResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(
            CATALOG_MAGIC.len() + self.entries.len() * ENTRY_SIZE,
        ));
        cursor.write_le(CATALOG_MAGIC)?;
        for entry in &self.entries {
            cursor.write_le(entry)?;
        }
        Ok(cursor.into_inner())
    }

    /// Find an entry by digest
    pub fn find(&self, sha1: &Sha1) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| &e.sha1 == sha1)
    }
}

impl FrostFormat for CasCatalog {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::read(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.write()?)
    }
}
