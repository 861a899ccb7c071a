//! Layout resolution, patch overlay merging and bundle mounting for
//! Frostbite 2013.2 game data.
//!
//! A load runs as one pipeline:
//!
//! - **Discovery**: [`layout::LayoutResolver`] finds update packages, picks
//!   the authoritative layout when its stamps match the base, and locates
//!   every superbundle's `.toc`/`.sb` pair
//! - **Merge**: each superbundle's base and authoritative tables of contents
//!   are merged into a [`superbundle::CompositeSuperbundle`]
//! - **Mount**: [`bundle::BundleMountDispatcher`] picks one of five strategies
//!   per bundle and announces the parsed bundle on a [`mount::MountSurface`]
//!
//! [`loader::GameLoader`] drives the whole cycle and publishes the discovery
//! snapshot atomically.
//!
//! # Example
//!
//! ```rust,ignore
//! use frostmount_storage::{GameLoader, LoaderConfig, MountRegistry};
//! use frostmount_storage::vfs::HostFileSystem;
//! use std::sync::Arc;
//!
//! let fs = Arc::new(HostFileSystem::new("/game", "/path/to/Battlefield 4"));
//! let surface = Arc::new(MountRegistry::new());
//! let loader = GameLoader::new(LoaderConfig::default(), fs, surface.clone());
//! let summary = loader.load()?;
//! println!("{} superbundles", summary.superbundles);
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use frostmount_formats::bundle::BundleError;
use frostmount_formats::catalog::CatalogError;
use frostmount_formats::dbobject::DbError;
use frostmount_formats::header::HeaderError;
use thiserror::Error;

// Bundle dispatch, delta merging and bookkeeping
pub mod bundle;

// Loader configuration
pub mod config;

// CAS catalog mounting
pub mod content;

// Load cycle notifications
pub mod events;

// Package and superbundle discovery
pub mod layout;

// Transactional load driver
pub mod loader;

// Mount surface and in-memory registry
pub mod mount;

// Per-engine-revision parsing
pub mod revision;

// Superbundle layouts, merging and mounting
pub mod superbundle;

// Virtual file system access
pub mod vfs;

mod document;

pub use config::{LoaderConfig, Strictness};
pub use events::{EventSink, MountEvent, NullSink, RecordingSink};
pub use layout::{GameLayout, LayoutNotice, LayoutResolver};
pub use loader::{GameLoader, LoadSummary};
pub use mount::{MountRegistry, MountSurface, MountedEntity, Namespace};
pub use revision::{EngineRevision, RevisionCodec};

/// Result type for mount operations.
pub type Result<T> = std::result::Result<T, MountError>;

/// Errors that can occur while discovering or mounting game data.
#[derive(Debug, Error)]
pub enum MountError {
    /// Structural problem that aborts the whole load.
    #[error("Fatal configuration error: {0}")]
    FatalConfiguration(String),

    /// A single file or bundle uses an encoding that cannot be read.
    #[error("Unsupported format in {context}: {reason}")]
    UnsupportedFormat {
        /// File or bundle that failed
        context: String,
        /// What was not supported
        reason: String,
    },

    /// A descriptor could not be located; the entry is skipped.
    #[error("Lookup failed: {0}")]
    RecoverableLookup(String),

    /// Capability not implemented for an engine revision.
    #[error("{feature} is not supported for {revision}")]
    Unsupported {
        /// Engine revision in use
        revision: EngineRevision,
        /// Missing capability
        feature: &'static str,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document header error.
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    /// Malformed document.
    #[error("Document error: {0}")]
    Document(#[from] DbError),

    /// Malformed bundle body.
    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    /// Malformed CAS catalog.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl MountError {
    /// Whether the failed unit may be skipped while the load continues.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::FatalConfiguration(_))
    }

    /// Attach a bundle name to a bundle parsing error.
    ///
    /// dbx-mode bundles surface as [`MountError::UnsupportedFormat`].
    pub fn from_bundle(bundle: &str, error: BundleError) -> Self {
        match error {
            BundleError::DbxMode => Self::UnsupportedFormat {
                context: bundle.to_string(),
                reason: "dbx-mode bundles are not supported".to_string(),
            },
            other => Self::Bundle(other),
        }
    }
}

/// Default virtual root the game directory is mounted at.
pub const DEFAULT_GAME_ROOT: &str = "/game";

/// Base data directory under the game root.
pub const DATA_DIR: &str = "Data";

/// Update package directory under the game root.
pub const UPDATE_DIR: &str = "Update";

/// Top-level layout document inside a data directory.
pub const LAYOUT_FILE: &str = "layout.toc";

/// Package manifest inside an update package directory.
pub const PACKAGE_MANIFEST: &str = "package.mft";

/// CAS catalog inside a data directory.
pub const CAS_CATALOG: &str = "cas.cat";

/// Table-of-contents file extension.
pub const TOC_EXTENSION: &str = ".toc";

/// Superbundle data file extension.
pub const SB_EXTENSION: &str = ".sb";
