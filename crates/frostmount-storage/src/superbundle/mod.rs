//! Superbundle layouts, merging and mounting

pub mod layout;
pub mod manager;
pub mod merge;

pub use layout::{BundleEntry, ChunkEntry, LayoutInfo, LayoutKind, SuperbundleLayout, bundle_key};
pub use manager::SuperbundleManager;
pub use merge::{CompositeSuperbundle, merge};
