//! Reading, merging and mounting superbundle tables of contents

use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::layout::{LayoutKind, SuperbundleLayout};
use super::merge::{CompositeSuperbundle, merge};
use crate::bundle::BundleRegistry;
use crate::config::Strictness;
use crate::document::read_document;
use crate::events::{EventSink, MountEvent};
use crate::layout::{GameLayout, SuperbundleEntry};
use crate::mount::{MountSurface, MountedEntity, Namespace};
use crate::revision::RevisionCodec;
use crate::vfs::GameFileSystem;
use crate::{MountError, Result};

/// Mounts every superbundle of a discovered layout
pub struct SuperbundleManager<'a> {
    fs: &'a dyn GameFileSystem,
    codec: &'a dyn RevisionCodec,
    surface: &'a dyn MountSurface,
    events: &'a dyn EventSink,
    strictness: Strictness,
    parallel: bool,
}

impl<'a> SuperbundleManager<'a> {
    /// Create a manager
    pub fn new(
        fs: &'a dyn GameFileSystem,
        codec: &'a dyn RevisionCodec,
        surface: &'a dyn MountSurface,
        events: &'a dyn EventSink,
        strictness: Strictness,
    ) -> Self {
        Self {
            fs,
            codec,
            surface,
            events,
            strictness,
            parallel: false,
        }
    }

    /// Mount independent superbundles on the rayon pool
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Read, merge and mount one superbundle
    pub fn mount_superbundle(&self, entry: &SuperbundleEntry) -> Result<Arc<CompositeSuperbundle>> {
        info!("Mounting superbundle {}", entry.name);

        let base = self.read_layout(&entry.toc_path(), LayoutKind::Base, &entry.name)?;
        let authoritative = match entry.patch_toc_path() {
            Some(path) => self.read_patch_layout(&path, &entry.name)?,
            None => None,
        };

        let composite = Arc::new(merge(base, authoritative));
        self.surface.mount(
            Namespace::Superbundles,
            &composite.name,
            MountedEntity::Superbundle(Arc::clone(&composite)),
        );
        for chunk in &composite.chunks {
            self.surface.mount(
                Namespace::Chunks,
                &chunk.key().to_string(),
                MountedEntity::SuperbundleChunk {
                    superbundle: composite.name.clone(),
                    chunk: *chunk.value(),
                },
            );
        }

        self.events.publish(MountEvent::SuperbundleMounted {
            name: composite.name.clone(),
            bundles: composite.bundles.len(),
            chunks: composite.chunks.len(),
            patched: composite.is_patched(),
        });
        Ok(composite)
    }

    /// Mount every superbundle of `layout` and record its bundles in `registry`
    ///
    /// Missing files skip the superbundle. Any other failure aborts in strict
    /// mode and skips in lenient mode. Results keep the layout's order.
    pub fn mount_superbundles(
        &self,
        layout: &GameLayout,
        registry: &BundleRegistry,
    ) -> Result<Vec<Arc<CompositeSuperbundle>>> {
        let results: Vec<_> = if self.parallel {
            layout
                .superbundles
                .par_iter()
                .map(|entry| self.mount_superbundle(entry))
                .collect()
        } else {
            layout
                .superbundles
                .iter()
                .map(|entry| self.mount_superbundle(entry))
                .collect()
        };

        let mut mounted = Vec::with_capacity(results.len());
        for (entry, result) in layout.superbundles.iter().zip(results) {
            match result {
                Ok(composite) => {
                    registry.discover_bundles(&composite);
                    mounted.push(composite);
                }
                Err(MountError::RecoverableLookup(reason)) => {
                    warn!("Skipping superbundle {}: {reason}", entry.name);
                }
                Err(error) if self.strictness == Strictness::Strict => return Err(error),
                Err(error) => warn!("Skipping superbundle {}: {error}", entry.name),
            }
        }

        info!("Mounted {} of {} superbundles", mounted.len(), layout.superbundles.len());
        Ok(mounted)
    }

    fn read_layout(&self, path: &str, kind: LayoutKind, name: &str) -> Result<SuperbundleLayout> {
        let document = read_document(self.fs, path)?;
        self.codec.parse_toc(&document, kind, name)
    }

    /// A patch table of contents that cannot be located leaves the base
    /// unpatched; an unknown header does too, unless strict.
    fn read_patch_layout(&self, path: &str, name: &str) -> Result<Option<SuperbundleLayout>> {
        match self.read_layout(path, LayoutKind::Authoritative, name) {
            Ok(layout) => Ok(Some(layout)),
            Err(MountError::RecoverableLookup(reason)) => {
                debug!("No patch toc for {name}: {reason}");
                Ok(None)
            }
            Err(error @ MountError::UnsupportedFormat { .. })
                if self.strictness == Strictness::Lenient =>
            {
                warn!("Ignoring patch toc for {name}: {error}");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}
