//! Classic bundle builder

use binrw::BinWriterExt;
use binrw::io::Cursor;

use super::classic::padding_for;
use super::error::BundleResult;
use super::manifest::{ChunkRecord, MAGIC_EBX_MODE, ManifestHeader, NameRecord};
use crate::dbobject::{DbObject, DbValue};
use crate::keys::{Guid, Sha1};

#[derive(Debug, Clone)]
struct PendingRecord {
    name: String,
    sha1: Sha1,
    payload: Vec<u8>,
}

#[derive(Debug, Clone)]
struct PendingResource {
    record: PendingRecord,
    res_type: u32,
    meta: [u8; 16],
    rid: u64,
}

#[derive(Debug, Clone)]
struct PendingChunk {
    id: Guid,
    sha1: Sha1,
    payload: Vec<u8>,
    meta: Option<DbObject>,
}

/// Builder for classic bundles
///
/// Output starts at the bundle origin: the `u32` manifest size, the
/// manifest, then every record padded to a 16-byte boundary.
#[derive(Debug, Clone)]
pub struct ClassicBundleBuilder {
    magic: u32,
    ebx: Vec<PendingRecord>,
    res: Vec<PendingResource>,
    chunks: Vec<PendingChunk>,
}

impl Default for ClassicBundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassicBundleBuilder {
    /// Create an empty ebx-mode builder
    pub const fn new() -> Self {
        Self {
            magic: MAGIC_EBX_MODE,
            ebx: Vec::new(),
            res: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Override the manifest magic
    pub const fn set_magic(&mut self, magic: u32) {
        self.magic = magic;
    }

    /// Add an ebx record
    pub fn add_ebx(&mut self, name: &str, payload: impl Into<Vec<u8>>) {
        self.add_ebx_with_sha1(name, Sha1::default(), payload);
    }

    /// Add an ebx record with an explicit digest
    pub fn add_ebx_with_sha1(&mut self, name: &str, sha1: Sha1, payload: impl Into<Vec<u8>>) {
        self.ebx.push(PendingRecord {
            name: name.to_string(),
            sha1,
            payload: payload.into(),
        });
    }

    /// Add a resource record
    pub fn add_res(
        &mut self,
        name: &str,
        res_type: u32,
        meta: [u8; 16],
        rid: u64,
        payload: impl Into<Vec<u8>>,
    ) {
        self.res.push(PendingResource {
            record: PendingRecord {
                name: name.to_string(),
                sha1: Sha1::default(),
                payload: payload.into(),
            },
            res_type,
            meta,
            rid,
        });
    }

    /// Add a chunk record with optional `chunkMeta`
    pub fn add_chunk(&mut self, id: Guid, payload: impl Into<Vec<u8>>, meta: Option<DbObject>) {
        self.chunks.push(PendingChunk {
            id,
            sha1: Sha1::default(),
            payload: payload.into(),
            meta,
        });
    }

    /// Serialize the bundle
    pub fn build(&self) -> BundleResult<Vec<u8>> {
        let named = self
            .ebx
            .iter()
            .chain(self.res.iter().map(|r| &r.record))
            .collect::<Vec<_>>();

        let mut text = Vec::new();
        let mut records = Vec::with_capacity(named.len());
        for record in &named {
            records.push(NameRecord {
                name_offset: text.len() as u32,
                payload_size: record.payload.len() as u32,
            });
            text.extend_from_slice(record.name.as_bytes());
            text.push(0);
        }

        let chunk_meta = if self.chunks.iter().any(|c| c.meta.is_some()) {
            let items = self
                .chunks
                .iter()
                .map(|c| DbValue::from(c.meta.clone().unwrap_or_default()))
                .collect::<Vec<_>>();
            DbValue::Object(DbObject::new().with("chunkMeta", items)).build()
        } else {
            Vec::new()
        };

        let mut header = ManifestHeader {
            magic: self.magic,
            total_count: (named.len() + self.chunks.len()) as u32,
            ebx_count: self.ebx.len() as u32,
            res_count: self.res.len() as u32,
            chunk_count: self.chunks.len() as u32,
            string_offset: 0,
            chunk_meta_offset: 0,
            chunk_meta_size: 0,
        };
        let tables_end = header.tables_end();
        if !chunk_meta.is_empty() {
            header.chunk_meta_offset = tables_end as u32;
            header.chunk_meta_size = chunk_meta.len() as u32;
        }
        header.string_offset = (tables_end + chunk_meta.len() as u64) as u32;
        let manifest_size = u64::from(header.string_offset) + text.len() as u64;

        let mut out = Cursor::new(Vec::new());
        out.write_be(&(manifest_size as u32))?;
        out.write_be(&header)?;
        for record in &named {
            out.write_be(&record.sha1)?;
        }
        for chunk in &self.chunks {
            out.write_be(&chunk.sha1)?;
        }
        for record in &records {
            out.write_be(record)?;
        }
        for res in &self.res {
            out.write_be(&res.res_type)?;
        }
        for res in &self.res {
            out.write_be(&res.meta)?;
        }
        for res in &self.res {
            out.write_be(&res.rid)?;
        }
        for chunk in &self.chunks {
            out.write_be(&ChunkRecord {
                id: chunk.id,
                range_start: 0,
                range_end: chunk.payload.len() as u32,
            })?;
        }
        let mut out = out.into_inner();
        debug_assert_eq!(out.len() as u64, 4 + tables_end);
        out.extend_from_slice(&chunk_meta);
        out.extend_from_slice(&text);

        let payloads = named
            .iter()
            .map(|r| &r.payload)
            .chain(self.chunks.iter().map(|c| &c.payload));
        for payload in payloads {
            pad(&mut out);
            out.extend_from_slice(payload);
        }
        pad(&mut out);
        Ok(out)
    }
}

fn pad(out: &mut Vec<u8>) {
    let padding = padding_for(out.len() as u64) as usize;
    out.resize(out.len() + padding, 0);
}
