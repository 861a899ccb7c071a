//! Classic bundle manifest
//!
//! Big-endian. A `u32` manifest size precedes the 32-byte header; every
//! offset in the header is relative to the header start.
//!
//! ```text
//! header           32 bytes
//! sha1             20 * total_count
//! name records      8 * (ebx_count + res_count)
//! res types         4 * res_count
//! res meta         16 * res_count
//! res ids           8 * res_count
//! chunk records    24 * chunk_count
//! chunk meta       chunk_meta_size bytes at chunk_meta_offset (optional)
//! text block       string_offset .. manifest_size
//! ```

use binrw::io::{Cursor, Read};
use binrw::{BinRead, BinReaderExt, BinWrite, Endian, VecArgs};

use super::error::{BundleError, BundleResult};
use crate::dbobject::{DbObject, DbValue, objects};
use crate::keys::{Guid, Sha1};

/// Manifest magic for ebx-mode bundles
pub const MAGIC_EBX_MODE: u32 = 0x970D_1C13;
/// Manifest magic for legacy dbx-mode bundles
pub const MAGIC_DBX_MODE: u32 = 0xED1C_EDB8;
/// Size of [`ManifestHeader`]
pub const MANIFEST_HEADER_SIZE: u64 = 32;

const SHA1_SIZE: u64 = 20;
const NAME_RECORD_SIZE: u64 = 8;
const RES_TYPE_SIZE: u64 = 4;
const RES_META_SIZE: u64 = 16;
const RES_RID_SIZE: u64 = 8;
const CHUNK_RECORD_SIZE: u64 = 24;

/// Fixed manifest header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct ManifestHeader {
    /// Encoding mode magic
    pub magic: u32,
    /// Number of SHA-1 entries (ebx + res + chunks)
    pub total_count: u32,
    /// Number of ebx records
    pub ebx_count: u32,
    /// Number of resource records
    pub res_count: u32,
    /// Number of chunk records
    pub chunk_count: u32,
    /// Offset of the text block
    pub string_offset: u32,
    /// Offset of the chunk metadata document
    pub chunk_meta_offset: u32,
    /// Size of the chunk metadata document, zero when absent
    pub chunk_meta_size: u32,
}

impl ManifestHeader {
    /// Whether records are ebx-mode
    pub const fn is_ebx_mode(&self) -> bool {
        self.magic == MAGIC_EBX_MODE
    }

    /// Whether records are legacy dbx-mode
    pub const fn is_dbx_mode(&self) -> bool {
        self.magic == MAGIC_DBX_MODE
    }

    /// End of the fixed-size tables, relative to the header start
    pub fn tables_end(&self) -> u64 {
        let named = u64::from(self.ebx_count) + u64::from(self.res_count);
        let res = u64::from(self.res_count);
        MANIFEST_HEADER_SIZE
            + u64::from(self.total_count) * SHA1_SIZE
            + named * NAME_RECORD_SIZE
            + res * (RES_TYPE_SIZE + RES_META_SIZE + RES_RID_SIZE)
            + u64::from(self.chunk_count) * CHUNK_RECORD_SIZE
    }
}

/// Name and payload size of an ebx or resource record
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct NameRecord {
    /// Offset of the name in the text block
    pub name_offset: u32,
    /// Payload size in the record stream
    pub payload_size: u32,
}

/// Chunk record
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct ChunkRecord {
    /// Chunk identifier
    pub id: Guid,
    /// First logical byte
    pub range_start: u32,
    /// One past the last logical byte
    pub range_end: u32,
}

impl ChunkRecord {
    /// Payload size in the record stream
    pub const fn payload_size(&self) -> u32 {
        self.range_end.saturating_sub(self.range_start)
    }
}

/// Fully read classic manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ClassicManifest {
    /// Declared manifest size, from the header start
    pub manifest_size: u32,
    /// Fixed header
    pub header: ManifestHeader,
    /// Digests for ebx, res then chunk records
    pub sha1s: Vec<Sha1>,
    /// Name records for ebx then res records
    pub records: Vec<NameRecord>,
    /// Resource type hashes
    pub res_types: Vec<u32>,
    /// Resource meta blocks
    pub res_meta: Vec<[u8; 16]>,
    /// Resource ids
    pub res_rids: Vec<u64>,
    /// Chunk records
    pub chunks: Vec<ChunkRecord>,
    /// Chunk metadata by chunk index, empty when absent
    pub chunk_meta: Vec<DbObject>,
    /// NUL-separated record names
    pub text_block: Vec<u8>,
}

impl ClassicManifest {
    /// Read the manifest at the reader's position
    ///
    /// Leaves the reader at the end of the manifest. dbx-mode manifests are
    /// rejected before any table is read.
    pub fn read<R: Read + binrw::io::Seek>(reader: &mut R) -> BundleResult<Self> {
        let manifest_size: u32 = reader.read_be()?;
        let header: ManifestHeader = reader.read_be()?;

        if header.is_dbx_mode() {
            return Err(BundleError::DbxMode);
        }
        if !header.is_ebx_mode() {
            return Err(BundleError::InvalidMagic(header.magic));
        }

        let size = u64::from(manifest_size);
        check_section("header", MANIFEST_HEADER_SIZE, size)?;

        let listed = u64::from(header.ebx_count)
            + u64::from(header.res_count)
            + u64::from(header.chunk_count);
        if listed != u64::from(header.total_count) {
            return Err(BundleError::CountMismatch {
                total: header.total_count,
                listed,
            });
        }

        let tables_end = header.tables_end();
        check_section("tables", tables_end, size)?;
        if u64::from(header.string_offset) < tables_end {
            return Err(BundleError::SectionOutOfBounds {
                section: "text block",
                end: u64::from(header.string_offset),
                manifest_size: size,
            });
        }
        check_section("text block", u64::from(header.string_offset), size)?;
        if header.chunk_meta_size > 0 {
            let start = u64::from(header.chunk_meta_offset);
            if start < tables_end {
                return Err(BundleError::SectionOutOfBounds {
                    section: "chunk meta",
                    end: start,
                    manifest_size: size,
                });
            }
            check_section(
                "chunk meta",
                start + u64::from(header.chunk_meta_size),
                size,
            )?;
        }

        // Sizes come from disk; grow the buffer as bytes actually arrive
        let body_len = size - MANIFEST_HEADER_SIZE;
        let mut body = Vec::with_capacity(body_len.min(1 << 20) as usize);
        reader.by_ref().take(body_len).read_to_end(&mut body)?;
        if body.len() as u64 != body_len {
            return Err(BundleError::Truncated {
                section: "manifest",
                expected: body_len,
                actual: body.len() as u64,
            });
        }

        let mut cursor = Cursor::new(body.as_slice());
        let sha1s: Vec<Sha1> = read_table(&mut cursor, header.total_count)?;
        let records: Vec<NameRecord> =
            read_table(&mut cursor, header.ebx_count + header.res_count)?;
        let res_types: Vec<u32> = read_table(&mut cursor, header.res_count)?;
        let res_meta: Vec<[u8; 16]> = read_table(&mut cursor, header.res_count)?;
        let res_rids: Vec<u64> = read_table(&mut cursor, header.res_count)?;
        let chunks: Vec<ChunkRecord> = read_table(&mut cursor, header.chunk_count)?;

        let chunk_meta = if header.chunk_meta_size > 0 {
            let start = body_offset(header.chunk_meta_offset, "chunk meta", size)?;
            let end = start + header.chunk_meta_size as usize;
            let bytes = body.get(start..end).ok_or(BundleError::SectionOutOfBounds {
                section: "chunk meta",
                end: end as u64 + MANIFEST_HEADER_SIZE,
                manifest_size: size,
            })?;
            parse_chunk_meta(bytes)?
        } else {
            Vec::new()
        };

        let text_start = body_offset(header.string_offset, "text block", size)?;
        let text_block = body
            .get(text_start..)
            .ok_or(BundleError::SectionOutOfBounds {
                section: "text block",
                end: u64::from(header.string_offset),
                manifest_size: size,
            })?
            .to_vec();

        Ok(Self {
            manifest_size,
            header,
            sha1s,
            records,
            res_types,
            res_meta,
            res_rids,
            chunks,
            chunk_meta,
            text_block,
        })
    }

    /// Resolve a record name from the text block
    pub fn name(&self, record: &NameRecord) -> BundleResult<String> {
        let start = record.name_offset as usize;
        let tail = self
            .text_block
            .get(start..)
            .ok_or_else(|| BundleError::NameOutOfBounds {
                offset: record.name_offset,
                text_size: self.text_block.len(),
            })?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(BundleError::InvalidName(record.name_offset))?;
        String::from_utf8(tail[..len].to_vec())
            .map_err(|_| BundleError::InvalidName(record.name_offset))
    }
}

/// Translate a header-relative offset into an index into the manifest body
fn body_offset(offset: u32, section: &'static str, manifest_size: u64) -> BundleResult<usize> {
    u64::from(offset)
        .checked_sub(MANIFEST_HEADER_SIZE)
        .map(|start| start as usize)
        .ok_or(BundleError::SectionOutOfBounds {
            section,
            end: u64::from(offset),
            manifest_size,
        })
}

fn check_section(section: &'static str, end: u64, manifest_size: u64) -> BundleResult<()> {
    if end > manifest_size {
        return Err(BundleError::SectionOutOfBounds {
            section,
            end,
            manifest_size,
        });
    }
    Ok(())
}

fn read_table<T>(cursor: &mut Cursor<&[u8]>, count: u32) -> BundleResult<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()> + 'static,
{
    Ok(cursor.read_type_args(
        Endian::Big,
        VecArgs {
            count: count as usize,
            inner: (),
        },
    )?)
}

/// Chunk metadata is stored as `{chunkMeta: [...]}` or as a bare list
fn parse_chunk_meta(bytes: &[u8]) -> BundleResult<Vec<DbObject>> {
    let value = DbValue::parse(bytes)?;
    let items = match &value {
        DbValue::Object(object) => object.list_or_empty("chunkMeta")?,
        DbValue::List(items) => items.as_slice(),
        _ => &[],
    };
    Ok(objects("chunkMeta", items)?.into_iter().cloned().collect())
}
