//! Package and superbundle discovery
//!
//! [`LayoutResolver::discover`] walks the game directory once and produces a
//! [`GameLayout`]: the update packages, the layout document in effect, and
//! where each superbundle's `.toc`/`.sb` pair lives.

use bytes::Bytes;
use frostmount_formats::layout::LayoutFile;
use frostmount_formats::package::PackageManifest;
use std::io::Cursor;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::document::{parse_document, read_document};
use crate::vfs::{GameFileSystem, join};
use crate::{
    DATA_DIR, LAYOUT_FILE, MountError, PACKAGE_MANIFEST, Result, SB_EXTENSION, TOC_EXTENSION,
};

/// An update package under the update directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Name from the manifest
    pub name: String,
    /// Directory name under the update directory
    pub dir_name: String,
    /// Virtual content root of the package
    pub path: String,
    /// Whether the package overrides the base layout
    pub authoritative: bool,
    /// Raw manifest file
    pub manifest: Bytes,
}

impl Package {
    /// Virtual data directory of the package
    pub fn data_dir(&self) -> String {
        join(&self.path, DATA_DIR)
    }
}

/// Where one superbundle's files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperbundleEntry {
    /// Superbundle name, e.g. `win32/globals`
    pub name: String,
    /// Base files without extension
    pub base_path: String,
    /// Package holding the base files, `None` for the root data directory
    pub base_package: Option<String>,
    /// Authoritative package holding a patch copy
    pub authoritative_package: Option<String>,
    /// Patch files without extension
    pub patch_path: Option<String>,
}

impl SuperbundleEntry {
    /// Base table of contents
    pub fn toc_path(&self) -> String {
        format!("{}{TOC_EXTENSION}", self.base_path)
    }

    /// Base data file
    pub fn sb_path(&self) -> String {
        format!("{}{SB_EXTENSION}", self.base_path)
    }

    /// Patch table of contents
    pub fn patch_toc_path(&self) -> Option<String> {
        self.patch_path
            .as_ref()
            .map(|path| format!("{path}{TOC_EXTENSION}"))
    }

    /// Patch data file
    pub fn patch_sb_path(&self) -> Option<String> {
        self.patch_path
            .as_ref()
            .map(|path| format!("{path}{SB_EXTENSION}"))
    }

    /// Whether an authoritative copy exists
    pub const fn is_patched(&self) -> bool {
        self.patch_path.is_some()
    }
}

/// A located filesystem entry from the layout's `fs` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemEntry {
    /// Entry name as listed
    pub name: String,
    /// Virtual path of the file
    pub path: String,
    /// Package holding the file, `None` for the root data directory
    pub package: Option<String>,
}

/// Notable conditions found during discovery that did not fail it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutNotice {
    /// The authoritative layout targets another base build and was ignored
    StaleOverlay {
        /// Discarded package
        package: String,
        /// Base layout `head` stamp
        head: Option<i64>,
        /// Patch layout `base` stamp
        base: Option<i64>,
    },
}

/// Result of one discovery pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameLayout {
    /// Virtual root data directory
    pub data_root: String,
    /// Update packages with readable manifests, sorted by directory name
    pub packages: Vec<Package>,
    /// Name of the retained authoritative package
    pub authoritative_package: Option<String>,
    /// Layout document in effect
    pub layout: LayoutFile,
    /// Superbundles whose base files were located, in layout order
    pub superbundles: Vec<SuperbundleEntry>,
    /// Located filesystem entries
    pub filesystems: Vec<FileSystemEntry>,
    /// Conditions the caller should surface
    pub notices: Vec<LayoutNotice>,
}

impl GameLayout {
    /// Look up a package by name
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// The retained authoritative package
    pub fn authoritative(&self) -> Option<&Package> {
        self.authoritative_package
            .as_deref()
            .and_then(|name| self.package(name))
    }

    /// Look up a superbundle entry by name, ignoring case
    pub fn superbundle(&self, name: &str) -> Option<&SuperbundleEntry> {
        self.superbundles
            .iter()
            .find(|sb| sb.name.eq_ignore_ascii_case(name))
    }

    /// Whether no superbundle was located
    pub fn is_empty(&self) -> bool {
        self.superbundles.is_empty()
    }
}

enum Overlay {
    Applies(LayoutFile),
    Stale { base: Option<i64> },
}

/// Discovers the storage layout of an installed game
pub struct LayoutResolver<'a> {
    fs: &'a dyn GameFileSystem,
    config: &'a LoaderConfig,
}

impl<'a> LayoutResolver<'a> {
    /// Create a resolver over `fs`
    pub fn new(fs: &'a dyn GameFileSystem, config: &'a LoaderConfig) -> Self {
        Self { fs, config }
    }

    /// Run one discovery pass
    pub fn discover(&self) -> Result<GameLayout> {
        let data_root = self.config.data_dir();
        if !self.fs.directory_exists(&data_root) {
            return Err(MountError::FatalConfiguration(format!(
                "data directory {data_root} does not exist"
            )));
        }

        let mut packages = self.discover_packages()?;
        let mut result = GameLayout {
            data_root: data_root.clone(),
            ..GameLayout::default()
        };

        let base_layout_path = join(&data_root, LAYOUT_FILE);
        let base_layout = match self.read_layout(&base_layout_path) {
            Ok(layout) => layout,
            Err(error) if self.config.is_strict() => {
                return Err(MountError::FatalConfiguration(format!(
                    "base layout unusable: {error}"
                )));
            }
            Err(error) => {
                warn!("Base layout unusable, returning an empty layout: {error}");
                result.packages = packages;
                return Ok(result);
            }
        };

        let mut layout = base_layout;
        let authoritative = packages.iter().find(|p| p.authoritative).cloned();
        if let Some(package) = authoritative {
            match self.authoritative_layout(&package, &layout)? {
                Overlay::Applies(patched) => {
                    info!("Using authoritative layout from package {}", package.name);
                    layout = patched;
                    result.authoritative_package = Some(package.name);
                }
                Overlay::Stale { base } => {
                    result.notices.push(LayoutNotice::StaleOverlay {
                        package: package.name.clone(),
                        head: layout.head,
                        base,
                    });
                    packages.retain(|p| p.name != package.name);
                }
            }
        }
        result.packages = packages;

        result.superbundles = layout
            .superbundles
            .iter()
            .filter_map(|sb| self.locate_superbundle(&result, &sb.name))
            .collect();
        result.filesystems = layout
            .filesystems
            .iter()
            .filter_map(|name| self.locate_filesystem(&result, name))
            .collect();
        result.layout = layout;

        info!(
            "Discovered {} superbundles, {} packages",
            result.superbundles.len(),
            result.packages.len()
        );
        Ok(result)
    }

    /// Read every package manifest under the update directory
    fn discover_packages(&self) -> Result<Vec<Package>> {
        let update_dir = self.config.update_dir();
        if !self.fs.directory_exists(&update_dir) {
            debug!("No update directory at {update_dir}");
            return Ok(Vec::new());
        }

        let mut dirs: Vec<String> = self
            .fs
            .list_path(&update_dir)?
            .into_iter()
            .filter(|entry| entry.is_dir)
            .map(|entry| entry.name)
            .collect();
        dirs.sort();

        let mut packages: Vec<Package> = Vec::with_capacity(dirs.len());
        for dir_name in dirs {
            let manifest_path = join(&join(&update_dir, &dir_name), PACKAGE_MANIFEST);
            let package = match self.read_package(&manifest_path, &dir_name) {
                Ok(package) => package,
                Err(error) => {
                    warn!("Skipping package {dir_name}: {error}");
                    continue;
                }
            };

            if package.authoritative {
                if let Some(existing) = packages.iter().find(|p| p.authoritative) {
                    return Err(MountError::FatalConfiguration(format!(
                        "packages {} and {} are both authoritative",
                        existing.name, package.name
                    )));
                }
            }
            debug!(
                "Found package {} at {} (authoritative: {})",
                package.name, package.path, package.authoritative
            );
            packages.push(package);
        }
        Ok(packages)
    }

    fn read_package(&self, manifest_path: &str, dir_name: &str) -> Result<Package> {
        let data = self
            .fs
            .read_file(manifest_path)
            .map_err(|e| MountError::RecoverableLookup(format!("{manifest_path}: {e}")))?;
        let object = parse_document(manifest_path, &mut Cursor::new(data.as_slice()))?;
        let manifest = PackageManifest::from_object(&object)?;

        Ok(Package {
            path: format!("{}{}", self.config.game_root, manifest.content_path(dir_name)),
            dir_name: dir_name.to_string(),
            authoritative: manifest.authoritative,
            name: manifest.name,
            manifest: Bytes::from(data),
        })
    }

    fn read_layout(&self, path: &str) -> Result<LayoutFile> {
        let object = read_document(self.fs, path)?;
        Ok(LayoutFile::from_object(&object)?)
    }

    /// Read the authoritative package's layout and check it against the base
    ///
    /// Missing or mismatched stamps and a missing layout all make the
    /// overlay stale.
    fn authoritative_layout(&self, package: &Package, base: &LayoutFile) -> Result<Overlay> {
        let path = join(&package.data_dir(), LAYOUT_FILE);
        let patched = match self.read_layout(&path) {
            Ok(layout) => layout,
            Err(MountError::RecoverableLookup(reason)) => {
                warn!("Authoritative package {} has no layout: {reason}", package.name);
                return Ok(Overlay::Stale { base: None });
            }
            Err(error @ MountError::UnsupportedFormat { .. }) if self.config.is_strict() => {
                return Err(MountError::FatalConfiguration(error.to_string()));
            }
            Err(error) => {
                warn!("Ignoring authoritative layout of {}: {error}", package.name);
                return Ok(Overlay::Stale { base: None });
            }
        };

        if patched.applies_to(base) {
            Ok(Overlay::Applies(patched))
        } else {
            warn!(
                "Authoritative package {} targets base {:?}, installed head is {:?}",
                package.name, patched.base, base.head
            );
            Ok(Overlay::Stale { base: patched.base })
        }
    }

    fn has_pair(&self, path: &str) -> bool {
        self.fs.file_exists(&format!("{path}{TOC_EXTENSION}"))
            && self.fs.file_exists(&format!("{path}{SB_EXTENSION}"))
    }

    /// Search order: root data directory, other packages, authoritative package
    fn locate_superbundle(&self, layout: &GameLayout, name: &str) -> Option<SuperbundleEntry> {
        let authoritative = layout.authoritative();
        let roots = std::iter::once((None, layout.data_root.clone()))
            .chain(
                layout
                    .packages
                    .iter()
                    .filter(|p| !p.authoritative)
                    .map(|p| (Some(p.name.clone()), p.data_dir())),
            )
            .chain(authoritative.map(|p| (Some(p.name.clone()), p.data_dir())));

        let mut base = None;
        for (package, dir) in roots {
            let path = join(&dir, name);
            if self.has_pair(&path) {
                base = Some((package, path));
                break;
            }
        }
        let Some((base_package, base_path)) = base else {
            warn!("Superbundle {name} not found in any data directory");
            return None;
        };

        let patch = authoritative
            .filter(|p| base_package.as_deref() != Some(p.name.as_str()))
            .map(|p| (p.name.clone(), join(&p.data_dir(), name)))
            .filter(|(_, path)| self.has_pair(path));

        let (authoritative_package, patch_path) = patch.unzip();
        Some(SuperbundleEntry {
            name: name.to_string(),
            base_path,
            base_package,
            authoritative_package,
            patch_path,
        })
    }

    /// Authoritative copies win, then the root data directory, then other packages
    fn locate_filesystem(&self, layout: &GameLayout, name: &str) -> Option<FileSystemEntry> {
        let authoritative = layout.authoritative();
        let candidates = authoritative
            .map(|p| (Some(p.name.clone()), p.data_dir()))
            .into_iter()
            .chain(std::iter::once((None, layout.data_root.clone())))
            .chain(
                layout
                    .packages
                    .iter()
                    .filter(|p| !p.authoritative)
                    .map(|p| (Some(p.name.clone()), p.data_dir())),
            );

        for (package, dir) in candidates {
            let path = join(&dir, name);
            if self.fs.file_exists(&path) {
                return Some(FileSystemEntry {
                    name: name.to_string(),
                    path,
                    package,
                });
            }
        }
        warn!("Filesystem entry {name} not found");
        None
    }
}
