//! Mount surface
//!
//! Parsed superbundles, bundles and their members are announced to a
//! [`MountSurface`] under fixed namespaces. [`MountRegistry`] is the
//! in-memory surface used by the CLI and tests.

use dashmap::DashMap;
use frostmount_formats::bundle::{Bundle, BundleChunk, EbxEntry, ResourceEntry};
use frostmount_formats::catalog::CatalogEntry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::superbundle::{ChunkEntry, CompositeSuperbundle};

/// Mount point namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// `/sb`: merged superbundles
    Superbundles,
    /// `/bundles`: parsed bundles
    Bundles,
    /// `/chunks`: chunk descriptors and bundle chunks
    Chunks,
    /// `/res`: resources
    Resources,
    /// `/ebx`: ebx partitions
    Ebx,
    /// `/cas`: CAS catalog entries
    Cas,
}

impl Namespace {
    /// Every namespace
    pub const ALL: [Self; 6] = [
        Self::Superbundles,
        Self::Bundles,
        Self::Chunks,
        Self::Resources,
        Self::Ebx,
        Self::Cas,
    ];

    /// Mount point path
    pub const fn path(self) -> &'static str {
        match self {
            Self::Superbundles => "/sb",
            Self::Bundles => "/bundles",
            Self::Chunks => "/chunks",
            Self::Resources => "/res",
            Self::Ebx => "/ebx",
            Self::Cas => "/cas",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.path())
    }
}

/// Anything that can be mounted
#[derive(Debug, Clone)]
pub enum MountedEntity {
    /// Merged superbundle
    Superbundle(Arc<CompositeSuperbundle>),
    /// Chunk descriptor from a superbundle table of contents
    SuperbundleChunk {
        /// Owning superbundle
        superbundle: String,
        /// Descriptor
        chunk: ChunkEntry,
    },
    /// Parsed bundle
    Bundle(Arc<Bundle>),
    /// Chunk member of a bundle
    BundleChunk {
        /// Owning bundle path
        bundle: String,
        /// Member
        chunk: BundleChunk,
    },
    /// Resource member of a bundle
    Resource {
        /// Owning bundle path
        bundle: String,
        /// Member
        resource: ResourceEntry,
    },
    /// Ebx member of a bundle
    Ebx {
        /// Owning bundle path
        bundle: String,
        /// Member
        ebx: EbxEntry,
    },
    /// CAS catalog entry
    CasEntry(CatalogEntry),
}

/// Receiver of mounted entities
pub trait MountSurface: Send + Sync {
    /// Mount `entity` at `key` in `namespace`, replacing any previous entity
    fn mount(&self, namespace: Namespace, key: &str, entity: MountedEntity);

    /// Remove one entity
    fn dismount(&self, namespace: Namespace, key: &str) -> bool;

    /// Remove everything
    fn clear(&self);
}

/// Concurrent in-memory mount surface
pub struct MountRegistry {
    namespaces: HashMap<Namespace, DashMap<String, MountedEntity>>,
}

impl Default for MountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MountRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            namespaces: Namespace::ALL
                .into_iter()
                .map(|ns| (ns, DashMap::new()))
                .collect(),
        }
    }

    fn namespace(&self, namespace: Namespace) -> Option<&DashMap<String, MountedEntity>> {
        self.namespaces.get(&namespace)
    }

    /// Look up a mounted entity
    pub fn get(&self, namespace: Namespace, key: &str) -> Option<MountedEntity> {
        self.namespace(namespace)
            .and_then(|map| map.get(key).map(|entry| entry.value().clone()))
    }

    /// Whether a key is mounted
    pub fn contains(&self, namespace: Namespace, key: &str) -> bool {
        self.namespace(namespace)
            .is_some_and(|map| map.contains_key(key))
    }

    /// Sorted keys of one namespace
    pub fn keys(&self, namespace: Namespace) -> Vec<String> {
        let mut keys: Vec<String> = self
            .namespace(namespace)
            .map(|map| map.iter().map(|entry| entry.key().clone()).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Number of entities in one namespace
    pub fn len(&self, namespace: Namespace) -> usize {
        self.namespace(namespace).map_or(0, DashMap::len)
    }

    /// Whether nothing is mounted anywhere
    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(DashMap::is_empty)
    }

    /// Mounted bundle by path
    pub fn bundle(&self, path: &str) -> Option<Arc<Bundle>> {
        match self.get(Namespace::Bundles, path)? {
            MountedEntity::Bundle(bundle) => Some(bundle),
            _ => None,
        }
    }

    /// Mounted superbundle by name
    pub fn superbundle(&self, name: &str) -> Option<Arc<CompositeSuperbundle>> {
        match self.get(Namespace::Superbundles, name)? {
            MountedEntity::Superbundle(superbundle) => Some(superbundle),
            _ => None,
        }
    }
}

impl MountSurface for MountRegistry {
    fn mount(&self, namespace: Namespace, key: &str, entity: MountedEntity) {
        if let Some(map) = self.namespace(namespace) {
            map.insert(key.to_string(), entity);
        }
    }

    fn dismount(&self, namespace: Namespace, key: &str) -> bool {
        self.namespace(namespace)
            .is_some_and(|map| map.remove(key).is_some())
    }

    fn clear(&self) {
        for map in self.namespaces.values() {
            map.clear();
        }
    }
}

/// Announce a bundle and every member under their namespaces
pub fn mount_bundle(surface: &dyn MountSurface, bundle: &Arc<Bundle>) {
    surface.mount(
        Namespace::Bundles,
        &bundle.path,
        MountedEntity::Bundle(Arc::clone(bundle)),
    );
    for chunk in &bundle.chunks {
        surface.mount(
            Namespace::Chunks,
            &chunk.id.to_string(),
            MountedEntity::BundleChunk {
                bundle: bundle.path.clone(),
                chunk: chunk.clone(),
            },
        );
    }
    for resource in &bundle.res {
        surface.mount(
            Namespace::Resources,
            &resource.name,
            MountedEntity::Resource {
                bundle: bundle.path.clone(),
                resource: resource.clone(),
            },
        );
    }
    for ebx in &bundle.ebx {
        surface.mount(
            Namespace::Ebx,
            &ebx.name,
            MountedEntity::Ebx {
                bundle: bundle.path.clone(),
                ebx: ebx.clone(),
            },
        );
    }
}

/// Remove a bundle and every member it announced
pub fn dismount_bundle(surface: &dyn MountSurface, bundle: &Bundle) {
    surface.dismount(Namespace::Bundles, &bundle.path);
    for chunk in &bundle.chunks {
        surface.dismount(Namespace::Chunks, &chunk.id.to_string());
    }
    for resource in &bundle.res {
        surface.dismount(Namespace::Resources, &resource.name);
    }
    for ebx in &bundle.ebx {
        surface.dismount(Namespace::Ebx, &ebx.name);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use frostmount_formats::keys::{Guid, Sha1};

    fn bundle() -> Arc<Bundle> {
        let mut bundle = Bundle::new("win32/ui/hud");
        bundle.ebx.push(EbxEntry {
            name: "UI/Hud".to_string(),
            sha1: Sha1::default(),
            size: 4,
            original_size: 4,
            payload: None,
        });
        bundle.chunks.push(BundleChunk {
            id: Guid::from_bytes([1; 16]),
            sha1: Sha1::default(),
            size: 8,
            logical_offset: 0,
            logical_size: 8,
            meta: None,
            payload: None,
        });
        Arc::new(bundle)
    }

    #[test]
    fn test_mount_bundle_announces_members() {
        let registry = MountRegistry::new();
        let bundle = bundle();
        mount_bundle(&registry, &bundle);

        assert!(registry.bundle("win32/ui/hud").is_some());
        assert!(registry.contains(Namespace::Ebx, "UI/Hud"));
        assert_eq!(registry.len(Namespace::Chunks), 1);
        assert_eq!(registry.len(Namespace::Resources), 0);

        dismount_bundle(&registry, &bundle);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_and_keys() {
        let registry = MountRegistry::new();
        for key in ["b", "a"] {
            registry.mount(
                Namespace::Bundles,
                key,
                MountedEntity::Bundle(Arc::new(Bundle::new(key))),
            );
        }
        assert_eq!(registry.keys(Namespace::Bundles), vec!["a", "b"]);
        assert_eq!(Namespace::Bundles.to_string(), "/bundles");
        registry.clear();
        assert!(registry.is_empty());
    }
}
