//! Bundle mounting
//!
//! [`dispatch`] picks a strategy per bundle descriptor and reads the body,
//! [`delta`] holds the record-level merge used for incremental patches and
//! [`registry`] tracks which discovered bundles are mounted.

pub mod delta;
pub mod dispatch;
pub mod registry;

pub use delta::{DeltaMerge, KeyedOverlayMerge, RejectDeltaMerge};
pub use dispatch::{
    BundleFailure, BundleMountDispatcher, MountReport, MountStrategy, MountedBundle,
    SuperbundleReaders, select,
};
pub use registry::{BundleRegistry, DiscoveredBundle};
