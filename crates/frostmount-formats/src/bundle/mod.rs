//! Bundle bodies
//!
//! Two encodings exist. Classic bundles are a [`ClassicManifest`] followed
//! by a record stream where every record starts on a 16-byte boundary
//! relative to the bundle start. Content-addressed bundles are a single
//! DbObject describing their members inline; payloads live in the CAS
//! archives and are not part of the body.

mod builder;
mod cas;
mod classic;
mod error;
mod manifest;

pub use builder::ClassicBundleBuilder;
pub use cas::{cas_body_object, cas_body_from_object, read_cas_body};
pub use classic::{align16, padding_for, parse_classic, read_classic_bundle};
pub use error::{BundleError, BundleResult};
pub use manifest::{
    ChunkRecord, ClassicManifest, MAGIC_DBX_MODE, MAGIC_EBX_MODE, MANIFEST_HEADER_SIZE,
    ManifestHeader, NameRecord,
};

use crate::dbobject::DbObject;
use crate::keys::{Guid, Sha1};
use bytes::Bytes;

/// Fully parsed bundle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bundle {
    /// Bundle path
    pub path: String,
    /// Salt applied to member hashes
    pub magic_salt: u32,
    /// Members are 16-byte aligned in the record stream
    pub align_members: bool,
    /// Total byte size of the bundle
    pub total_size: u64,
    /// Ebx members in stored order
    pub ebx: Vec<EbxEntry>,
    /// Resource members in stored order
    pub res: Vec<ResourceEntry>,
    /// Chunk members in stored order
    pub chunks: Vec<BundleChunk>,
}

impl Bundle {
    /// Empty bundle
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Number of members of every kind
    pub fn member_count(&self) -> usize {
        self.ebx.len() + self.res.len() + self.chunks.len()
    }
}

/// Ebx member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbxEntry {
    /// Asset name
    pub name: String,
    /// Content digest
    pub sha1: Sha1,
    /// Stored size
    pub size: u64,
    /// Decoded size
    pub original_size: u64,
    /// Raw record bytes, classic bundles only
    pub payload: Option<Bytes>,
}

/// Resource member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Resource name
    pub name: String,
    /// Content digest
    pub sha1: Sha1,
    /// Stored size
    pub size: u64,
    /// Decoded size
    pub original_size: u64,
    /// Resource type hash
    pub res_type: u32,
    /// Type-specific meta block
    pub res_meta: Vec<u8>,
    /// Resource id
    pub res_rid: u64,
    /// Raw record bytes, classic bundles only
    pub payload: Option<Bytes>,
}

/// Chunk member
#[derive(Debug, Clone, PartialEq)]
pub struct BundleChunk {
    /// Chunk identifier
    pub id: Guid,
    /// Content digest
    pub sha1: Sha1,
    /// Stored size
    pub size: u64,
    /// First logical byte covered
    pub logical_offset: u32,
    /// Logical byte count
    pub logical_size: u32,
    /// Attached `chunkMeta` record
    pub meta: Option<DbObject>,
    /// Raw record bytes, classic bundles only
    pub payload: Option<Bytes>,
}
