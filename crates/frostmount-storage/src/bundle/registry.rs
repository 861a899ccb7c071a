//! Discovered bundle bookkeeping

use dashmap::DashMap;
use frostmount_formats::bundle::Bundle;
use std::sync::Arc;
use tracing::debug;

use crate::mount::{MountSurface, dismount_bundle};
use crate::superbundle::{BundleEntry, CompositeSuperbundle};

/// A bundle known from a mounted superbundle
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredBundle {
    /// Composite descriptor
    pub entry: BundleEntry,
    /// Owning superbundle name
    pub superbundle: String,
    /// Mounted body, if any
    pub mounted: Option<Arc<Bundle>>,
}

impl DiscoveredBundle {
    /// Whether the body is currently mounted
    pub const fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }
}

/// Every bundle discovered across mounted superbundles
///
/// Keys are lower-cased bundle names. A bundle listed by two superbundles
/// belongs to the one discovered last.
#[derive(Debug, Default)]
pub struct BundleRegistry {
    bundles: DashMap<String, DiscoveredBundle>,
}

impl BundleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every bundle of `superbundle`; returns how many were recorded
    pub fn discover_bundles(&self, superbundle: &CompositeSuperbundle) -> usize {
        let mut count = 0;
        for entry in &superbundle.bundles {
            self.bundles.insert(
                entry.key().clone(),
                DiscoveredBundle {
                    entry: entry.value().clone(),
                    superbundle: superbundle.name.clone(),
                    mounted: None,
                },
            );
            count += 1;
        }
        debug!("Discovered {count} bundles in {}", superbundle.name);
        count
    }

    /// Look up a bundle by name, ignoring case
    pub fn get(&self, name: &str) -> Option<DiscoveredBundle> {
        self.bundles
            .get(&crate::superbundle::bundle_key(name))
            .map(|entry| entry.value().clone())
    }

    /// Every discovered bundle sorted by name
    pub fn discovered_bundles(&self) -> Vec<DiscoveredBundle> {
        let mut bundles: Vec<_> = self.bundles.iter().map(|e| e.value().clone()).collect();
        bundles.sort_by(|a, b| a.entry.key().cmp(&b.entry.key()));
        bundles
    }

    /// Number of discovered bundles
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Whether nothing was discovered
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Number of mounted bundles
    pub fn mounted_count(&self) -> usize {
        self.bundles.iter().filter(|e| e.value().is_mounted()).count()
    }

    /// Record the mounted body of a discovered bundle
    pub fn mark_mounted(&self, name: &str, bundle: Arc<Bundle>) -> bool {
        match self.bundles.get_mut(&crate::superbundle::bundle_key(name)) {
            Some(mut discovered) => {
                discovered.mounted = Some(bundle);
                true
            }
            None => false,
        }
    }

    /// Remove one mounted bundle and its members from `surface`
    ///
    /// The bundle stays discovered. Returns `false` if it was not mounted.
    pub fn dismount_bundle(&self, surface: &dyn MountSurface, name: &str) -> bool {
        let mounted = self
            .bundles
            .get_mut(&crate::superbundle::bundle_key(name))
            .and_then(|mut discovered| discovered.mounted.take());

        match mounted {
            Some(bundle) => {
                dismount_bundle(surface, &bundle);
                true
            }
            None => false,
        }
    }

    /// Dismount every mounted bundle; returns how many were dismounted
    pub fn dismount_bundles(&self, surface: &dyn MountSurface) -> usize {
        let mounted: Vec<String> = self
            .bundles
            .iter()
            .filter(|e| e.value().is_mounted())
            .map(|e| e.key().clone())
            .collect();
        mounted
            .iter()
            .filter(|name| self.dismount_bundle(surface, name))
            .count()
    }

    /// Forget everything
    pub fn clear(&self) {
        self.bundles.clear();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mount::{MountRegistry, Namespace, mount_bundle};
    use crate::superbundle::{LayoutKind, SuperbundleLayout, merge};
    use frostmount_formats::bundle::Bundle;
    use frostmount_formats::toc::{TocBundle, TocFile};
    use std::sync::Arc;

    fn superbundle(name: &str, bundles: &[&str]) -> CompositeSuperbundle {
        let toc = TocFile {
            name: None,
            content_addressed: false,
            bundles: bundles.iter().map(|b| TocBundle::new(*b, 0, 1)).collect(),
            chunks: vec![],
        };
        merge(SuperbundleLayout::from_toc(name, &toc, LayoutKind::Base), None)
    }

    #[test]
    fn test_discovery_is_insert_or_update() {
        let registry = BundleRegistry::new();
        assert_eq!(registry.discover_bundles(&superbundle("win32/a", &["Shared", "only_a"])), 2);
        assert_eq!(registry.discover_bundles(&superbundle("win32/b", &["shared"])), 1);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("SHARED").expect("shared").superbundle, "win32/b");
        let names: Vec<_> = registry
            .discovered_bundles()
            .into_iter()
            .map(|b| b.entry.id)
            .collect();
        assert_eq!(names, ["only_a", "shared"]);
    }

    #[test]
    fn test_dismount_removes_members() {
        let surface = MountRegistry::new();
        let registry = BundleRegistry::new();
        registry.discover_bundles(&superbundle("win32/ui", &["win32/ui/hud"]));

        let mut bundle = Bundle::new("win32/ui/hud");
        bundle.ebx.push(frostmount_formats::bundle::EbxEntry {
            name: "ui/hud".into(),
            sha1: frostmount_formats::keys::Sha1::default(),
            size: 0,
            original_size: 0,
            payload: None,
        });
        let bundle = Arc::new(bundle);
        mount_bundle(&surface, &bundle);
        assert!(registry.mark_mounted("win32/ui/hud", bundle));
        assert_eq!(registry.mounted_count(), 1);

        assert_eq!(registry.dismount_bundles(&surface), 1);
        assert!(!surface.contains(Namespace::Bundles, "win32/ui/hud"));
        assert!(!surface.contains(Namespace::Ebx, "ui/hud"));
        assert!(!registry.dismount_bundle(&surface, "win32/ui/hud"));
        assert!(registry.get("win32/ui/hud").is_some());
    }
}
