//! CAS catalog mounting

use frostmount_formats::catalog::CasCatalog;
use frostmount_formats::keys::Sha1;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::Strictness;
use crate::layout::GameLayout;
use crate::mount::{MountSurface, MountedEntity, Namespace};
use crate::vfs::{GameFileSystem, join};
use crate::{CAS_CATALOG, MountError, Result};

/// Mounts the content-addressed storage catalogs of a layout under `/cas`
pub struct ContentManager<'a> {
    fs: &'a dyn GameFileSystem,
    surface: &'a dyn MountSurface,
    strictness: Strictness,
}

impl<'a> ContentManager<'a> {
    /// Create a manager
    pub fn new(
        fs: &'a dyn GameFileSystem,
        surface: &'a dyn MountSurface,
        strictness: Strictness,
    ) -> Self {
        Self {
            fs,
            surface,
            strictness,
        }
    }

    /// Mount the base catalog, then the authoritative one over it
    ///
    /// Returns the number of distinct digests mounted. Games without a
    /// catalog mount nothing.
    pub fn mount_base_content(&self, layout: &GameLayout) -> Result<usize> {
        let mut digests = HashSet::new();
        self.mount_catalog(&join(&layout.data_root, CAS_CATALOG), &mut digests)?;
        if let Some(package) = layout.authoritative() {
            self.mount_catalog(&join(&package.data_dir(), CAS_CATALOG), &mut digests)?;
        }

        info!("Mounted {} CAS catalog entries", digests.len());
        Ok(digests.len())
    }

    fn mount_catalog(&self, path: &str, digests: &mut HashSet<Sha1>) -> Result<()> {
        if !self.fs.file_exists(path) {
            debug!("No CAS catalog at {path}");
            return Ok(());
        }

        let catalog = match self
            .fs
            .read_file(path)
            .map_err(MountError::from)
            .and_then(|data| Ok(CasCatalog::read(&data)?))
        {
            Ok(catalog) => catalog,
            Err(error) if self.strictness == Strictness::Strict => return Err(error),
            Err(error) => {
                warn!("Skipping CAS catalog {path}: {error}");
                return Ok(());
            }
        };

        debug!("Mounting {} entries from {path}", catalog.entries.len());
        for entry in catalog.entries {
            self.surface
                .mount(Namespace::Cas, &entry.sha1.to_hex(), MountedEntity::CasEntry(entry));
            digests.insert(entry.sha1);
        }
        Ok(())
    }
}
