//! Per-bundle strategy selection and mounting

use frostmount_formats::bundle::Bundle;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::delta::DeltaMerge;
use crate::config::Strictness;
use crate::layout::SuperbundleEntry;
use crate::mount::{MountSurface, mount_bundle};
use crate::revision::RevisionCodec;
use crate::superbundle::{BundleEntry, CompositeSuperbundle, LayoutKind};
use crate::vfs::{FileReader, GameFileSystem};
use crate::{MountError, Result};

/// How one bundle body is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountStrategy {
    /// Self-describing body read from the patch file
    PatchedContentAddressed,
    /// Base bundle with an incremental overlay applied
    PatchedDelta,
    /// Patch copy replaces the base bundle
    PatchedFull,
    /// Self-describing body read from the owning file
    ContentAddressed,
    /// Manifest and aligned record stream read from the owning file
    Classic,
}

impl fmt::Display for MountStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PatchedContentAddressed => "patched-cas",
            Self::PatchedDelta => "patched-delta",
            Self::PatchedFull => "patched-full",
            Self::ContentAddressed => "cas",
            Self::Classic => "classic",
        };
        f.write_str(name)
    }
}

/// Pick the strategy for one bundle; the first matching rule wins
pub fn select(composite: &CompositeSuperbundle, entry: &BundleEntry) -> MountStrategy {
    let owner_cas = composite
        .layout(entry.owner)
        .is_some_and(|info| info.content_addressed);

    if composite.is_patched() && owner_cas {
        return MountStrategy::PatchedContentAddressed;
    }
    match &entry.delta_entry {
        Some(overlay) if overlay.is_delta => MountStrategy::PatchedDelta,
        Some(_) => MountStrategy::PatchedFull,
        None if owner_cas => MountStrategy::ContentAddressed,
        None => MountStrategy::Classic,
    }
}

/// Open data files of one superbundle
///
/// Both readers are owned and closed when this value drops.
pub struct SuperbundleReaders {
    base: FileReader,
    patch: Option<FileReader>,
}

impl SuperbundleReaders {
    /// Wrap already opened readers
    pub fn new(base: FileReader, patch: Option<FileReader>) -> Self {
        Self { base, patch }
    }

    /// Open the base `.sb` and, when `patched`, the authoritative `.sb`
    pub fn open(fs: &dyn GameFileSystem, entry: &SuperbundleEntry, patched: bool) -> Result<Self> {
        let base_path = entry.sb_path();
        let base = fs
            .open_file_read(&base_path)
            .map_err(|e| MountError::RecoverableLookup(format!("{base_path}: {e}")))?;

        let patch = match entry.patch_sb_path() {
            Some(path) if patched => Some(
                fs.open_file_read(&path)
                    .map_err(|e| MountError::RecoverableLookup(format!("{path}: {e}")))?,
            ),
            _ => None,
        };

        Ok(Self { base, patch })
    }

    /// Reader for the file that owns entries of `kind`
    pub fn reader(&mut self, kind: LayoutKind) -> Result<&mut FileReader> {
        match kind {
            LayoutKind::Base => Ok(&mut self.base),
            LayoutKind::Authoritative => self.patch.as_mut().ok_or_else(|| {
                MountError::RecoverableLookup("superbundle has no patch data file".to_string())
            }),
        }
    }
}

/// A bundle that could not be mounted
#[derive(Debug)]
pub struct BundleFailure {
    /// Bundle name
    pub bundle: String,
    /// Strategy that was attempted
    pub strategy: MountStrategy,
    /// What went wrong
    pub error: MountError,
}

/// A bundle announced on the mount surface
#[derive(Debug, Clone)]
pub struct MountedBundle {
    /// Composite key the bundle was mounted for
    pub key: String,
    /// Strategy that produced it
    pub strategy: MountStrategy,
    /// Parsed bundle
    pub bundle: Arc<Bundle>,
}

/// Outcome of mounting every bundle of one superbundle
#[derive(Debug, Default)]
pub struct MountReport {
    /// Superbundle name
    pub superbundle: String,
    /// Mounted bundles in key order
    pub bundles: Vec<MountedBundle>,
    /// Skipped bundles, only populated in lenient mode
    pub failures: Vec<BundleFailure>,
}

/// Reads bundle bodies and announces them on a mount surface
pub struct BundleMountDispatcher<'a> {
    codec: &'a dyn RevisionCodec,
    delta: &'a dyn DeltaMerge,
    surface: &'a dyn MountSurface,
    strictness: Strictness,
}

impl<'a> BundleMountDispatcher<'a> {
    /// Create a dispatcher using the codec's delta merge
    pub fn new(
        codec: &'a dyn RevisionCodec,
        surface: &'a dyn MountSurface,
        strictness: Strictness,
    ) -> Self {
        Self {
            codec,
            delta: codec.delta_merge(),
            surface,
            strictness,
        }
    }

    /// Replace the delta merge
    #[must_use]
    pub fn with_delta_merge(mut self, delta: &'a dyn DeltaMerge) -> Self {
        self.delta = delta;
        self
    }

    /// Mount every bundle of `composite` in key order
    ///
    /// In strict mode the first failure is returned; otherwise failures are
    /// collected in the report and the pass continues.
    pub fn mount_all(
        &self,
        composite: &CompositeSuperbundle,
        readers: &mut SuperbundleReaders,
    ) -> Result<MountReport> {
        let mut report = MountReport {
            superbundle: composite.name.clone(),
            ..MountReport::default()
        };

        for (key, entry) in composite.sorted_bundles() {
            let strategy = select(composite, &entry);
            match self.mount_with(strategy, composite, &entry, readers) {
                Ok(bundle) => report.bundles.push(MountedBundle {
                    key,
                    strategy,
                    bundle,
                }),
                Err(error) if self.strictness == Strictness::Strict => return Err(error),
                Err(error) => {
                    warn!("Skipping bundle {key} of {}: {error}", composite.name);
                    report.failures.push(BundleFailure {
                        bundle: entry.id.clone(),
                        strategy,
                        error,
                    });
                }
            }
        }

        info!(
            "Mounted {} bundles of {} ({} failed)",
            report.bundles.len(),
            composite.name,
            report.failures.len()
        );
        Ok(report)
    }

    /// Mount one bundle of `composite`
    pub fn mount_one(
        &self,
        composite: &CompositeSuperbundle,
        entry: &BundleEntry,
        readers: &mut SuperbundleReaders,
    ) -> Result<Arc<Bundle>> {
        self.mount_with(select(composite, entry), composite, entry, readers)
    }

    fn mount_with(
        &self,
        strategy: MountStrategy,
        composite: &CompositeSuperbundle,
        entry: &BundleEntry,
        readers: &mut SuperbundleReaders,
    ) -> Result<Arc<Bundle>> {
        debug!("Mounting bundle {} of {} ({strategy})", entry.id, composite.name);
        let bundle = Arc::new(self.read_bundle(strategy, composite, entry, readers)?);
        mount_bundle(self.surface, &bundle);
        Ok(bundle)
    }

    /// Produce the bundle body for `strategy` without announcing it
    pub fn read_bundle(
        &self,
        strategy: MountStrategy,
        composite: &CompositeSuperbundle,
        entry: &BundleEntry,
        readers: &mut SuperbundleReaders,
    ) -> Result<Bundle> {
        let cas = |kind: LayoutKind| {
            composite
                .layout(kind)
                .is_some_and(|info| info.content_addressed)
        };

        match strategy {
            MountStrategy::PatchedContentAddressed => {
                let reader = readers.reader(LayoutKind::Authoritative)?;
                self.codec.parse_bundle_body(reader, entry, true)
            }
            MountStrategy::PatchedDelta => {
                let overlay_entry = overlay_of(entry)?;
                let base = self.codec.parse_bundle_body(
                    readers.reader(entry.owner)?,
                    entry,
                    cas(entry.owner),
                )?;
                let overlay = self.codec.parse_bundle_body(
                    readers.reader(overlay_entry.owner)?,
                    overlay_entry,
                    cas(overlay_entry.owner),
                )?;
                debug!("Applying {} delta merge to {}", self.delta.name(), entry.id);
                self.delta.merge(base, overlay)
            }
            MountStrategy::PatchedFull => {
                let overlay_entry = overlay_of(entry)?;
                self.codec.parse_bundle_body(
                    readers.reader(overlay_entry.owner)?,
                    overlay_entry,
                    cas(overlay_entry.owner),
                )
            }
            MountStrategy::ContentAddressed => {
                self.codec
                    .parse_bundle_body(readers.reader(entry.owner)?, entry, true)
            }
            MountStrategy::Classic => {
                self.codec
                    .parse_bundle_body(readers.reader(entry.owner)?, entry, false)
            }
        }
    }
}

fn overlay_of(entry: &BundleEntry) -> Result<&BundleEntry> {
    entry
        .delta_entry
        .as_deref()
        .ok_or_else(|| MountError::RecoverableLookup(format!("{} has no patch entry", entry.id)))
}
