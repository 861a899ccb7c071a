//! Parsed superbundle table of contents

use frostmount_formats::keys::Guid;
use frostmount_formats::toc::{TocBundle, TocChunk, TocFile};
use std::collections::BTreeMap;

/// Which table of contents an entry came from
///
/// Entries refer to their layout through this handle instead of a pointer;
/// [`super::CompositeSuperbundle::layout`] resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// The installed base release
    Base,
    /// The authoritative update package
    Authoritative,
}

/// Flags of one parsed layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutInfo {
    /// Base or authoritative
    pub kind: LayoutKind,
    /// Bundle bodies are content-addressed documents
    pub content_addressed: bool,
}

/// Storage location of one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// Bundle name as stored
    pub id: String,
    /// Byte offset in the owning `.sb`
    pub offset: u64,
    /// Byte size in the owning `.sb`
    pub size: u64,
    /// Unchanged copy of a base bundle
    pub is_base_carryover: bool,
    /// Incremental patch record
    pub is_delta: bool,
    /// Patch overlay attached during merge
    pub delta_entry: Option<Box<BundleEntry>>,
    /// Layout this entry was read from
    pub owner: LayoutKind,
}

impl BundleEntry {
    /// Build from a table-of-contents record
    pub fn from_toc(record: &TocBundle, owner: LayoutKind) -> Self {
        Self {
            id: record.id.clone(),
            offset: record.offset,
            size: record.size,
            is_base_carryover: record.base,
            is_delta: record.delta,
            delta_entry: None,
            owner,
        }
    }

    /// Case-insensitive join key
    pub fn key(&self) -> String {
        bundle_key(&self.id)
    }
}

/// Normalize a bundle name into its map key
pub fn bundle_key(name: &str) -> String {
    name.to_lowercase()
}

/// Storage location of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkEntry {
    /// Chunk identifier
    pub id: Guid,
    /// Byte offset in the owning `.sb`
    pub offset: u64,
    /// Byte size in the owning `.sb`
    pub size: u64,
    /// Layout this entry was read from
    pub owner: LayoutKind,
}

impl ChunkEntry {
    /// Build from a table-of-contents record
    pub const fn from_toc(record: &TocChunk, owner: LayoutKind) -> Self {
        Self {
            id: record.id,
            offset: record.offset,
            size: record.size,
            owner,
        }
    }
}

/// One parsed table of contents, base or authoritative
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperbundleLayout {
    /// Superbundle name
    pub name: String,
    /// Flags shared by every entry
    pub info: LayoutInfo,
    /// Bundles by lower-cased name
    pub bundles: BTreeMap<String, BundleEntry>,
    /// Chunks by identifier
    pub chunks: BTreeMap<Guid, ChunkEntry>,
}

impl SuperbundleLayout {
    /// Index a table of contents
    ///
    /// A repeated bundle name or chunk id keeps the last record.
    pub fn from_toc(name: &str, toc: &TocFile, kind: LayoutKind) -> Self {
        let bundles = toc
            .bundles
            .iter()
            .map(|record| {
                let entry = BundleEntry::from_toc(record, kind);
                (entry.key(), entry)
            })
            .collect();
        let chunks = toc
            .chunks
            .iter()
            .map(|record| (record.id, ChunkEntry::from_toc(record, kind)))
            .collect();

        Self {
            name: name.to_string(),
            info: LayoutInfo {
                kind,
                content_addressed: toc.content_addressed,
            },
            bundles,
            chunks,
        }
    }

    /// Whether bundle bodies are content-addressed
    pub const fn is_content_addressed(&self) -> bool {
        self.info.content_addressed
    }

    /// Whether this is the authoritative layout
    pub fn is_authoritative(&self) -> bool {
        self.info.kind == LayoutKind::Authoritative
    }

    /// Case-insensitive bundle lookup
    pub fn bundle(&self, name: &str) -> Option<&BundleEntry> {
        self.bundles.get(&bundle_key(name))
    }
}
