//! Base and authoritative layout merging

use dashmap::DashMap;
use frostmount_formats::keys::Guid;
use tracing::debug;

use super::layout::{BundleEntry, ChunkEntry, LayoutInfo, LayoutKind, SuperbundleLayout};

/// Merged, ready-to-mount view of one superbundle
///
/// Built once per superbundle per load and never mutated afterwards.
#[derive(Debug)]
pub struct CompositeSuperbundle {
    /// Superbundle name
    pub name: String,
    /// Flags of the base layout
    pub base: LayoutInfo,
    /// Flags of the authoritative layout, when one was merged
    pub authoritative: Option<LayoutInfo>,
    /// Bundles by lower-cased name
    pub bundles: DashMap<String, BundleEntry>,
    /// Chunks by identifier
    pub chunks: DashMap<Guid, ChunkEntry>,
}

impl CompositeSuperbundle {
    /// Resolve an entry's owner handle
    pub fn layout(&self, kind: LayoutKind) -> Option<LayoutInfo> {
        match kind {
            LayoutKind::Base => Some(self.base),
            LayoutKind::Authoritative => self.authoritative,
        }
    }

    /// Whether an authoritative layout was merged in
    pub const fn is_patched(&self) -> bool {
        self.authoritative.is_some()
    }

    /// Whether the superbundle is content-addressed
    ///
    /// The base layout decides; an authoritative flag alone does not switch
    /// a classic superbundle to wholesale replacement.
    pub const fn is_content_addressed(&self) -> bool {
        self.base.content_addressed
    }

    /// Case-insensitive bundle lookup
    pub fn bundle(&self, name: &str) -> Option<BundleEntry> {
        self.bundles
            .get(&super::layout::bundle_key(name))
            .map(|entry| entry.value().clone())
    }

    /// Bundle entries sorted by key
    pub fn sorted_bundles(&self) -> Vec<(String, BundleEntry)> {
        let mut entries: Vec<_> = self
            .bundles
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// Merge a base layout with an optional authoritative layout
///
/// - Without an authoritative layout the composite is the base maps.
/// - Content-addressed superbundles take the authoritative bundle map whole.
/// - Classic superbundles keep base entries, skip unchanged carryovers,
///   attach same-named patch entries as `delta_entry` and add new ones.
/// - Authoritative chunks replace same-id base chunks.
pub fn merge(
    base: SuperbundleLayout,
    authoritative: Option<SuperbundleLayout>,
) -> CompositeSuperbundle {
    let composite = CompositeSuperbundle {
        name: base.name.clone(),
        base: base.info,
        authoritative: authoritative.as_ref().map(|layout| layout.info),
        bundles: DashMap::new(),
        chunks: base.chunks.into_iter().collect(),
    };

    let Some(patch) = authoritative else {
        for (key, entry) in base.bundles {
            composite.bundles.insert(key, entry);
        }
        return composite;
    };

    if base.info.content_addressed {
        debug!(
            "Superbundle {} is content-addressed, taking {} patch bundles wholesale",
            composite.name,
            patch.bundles.len()
        );
        for (key, entry) in patch.bundles {
            composite.bundles.insert(key, entry);
        }
    } else {
        for (key, entry) in base.bundles {
            composite.bundles.insert(key, entry);
        }
        for (key, entry) in patch.bundles {
            if entry.is_base_carryover && !entry.is_delta {
                continue;
            }
            match composite.bundles.get_mut(&key) {
                Some(mut existing) => existing.delta_entry = Some(Box::new(entry)),
                None => {
                    composite.bundles.insert(key, entry);
                }
            }
        }
    }

    for (id, chunk) in patch.chunks {
        composite.chunks.insert(id, chunk);
    }

    composite
}
