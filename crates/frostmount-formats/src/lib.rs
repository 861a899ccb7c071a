//! File format parsers and builders for Frostbite 2013.2 game data
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_sign_loss)] // Stored integers are reinterpreted
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many engine-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! Every superbundle table of contents, layout document, package manifest and
//! content-addressed bundle body is a DbObject tree behind one of several
//! header variants. Classic bundles use a big-endian manifest followed by a
//! 16-byte aligned record stream.
//!
//! # Supported Formats
//!
//! - **DbObject**: tagged binary key/value documents (reader and writer)
//! - **Header**: obfuscated, signed and plain document headers
//! - **Layout**: top-level `layout.toc` with superbundle list and build stamps
//! - **TOC**: per-superbundle bundle and chunk records
//! - **Package**: `package.mft` manifests of update packages
//! - **Bundle**: classic manifest + record stream, content-addressed bodies
//! - **Catalog**: `cas.cat` content catalogs
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: formats produced by tests can be built as well as parsed
//! - **Bounded Parsing**: every size read from disk is checked before use
//! - **Round-Trip Guarantee**: parse(build(data)) == data

#![warn(missing_docs)]

/// Classic and content-addressed bundle bodies
///
/// Classic bundles carry a manifest of SHA-1s, name records, resource tables
/// and chunk ranges, followed by the member payloads. dbx-mode bundles are
/// rejected as soon as the manifest magic is read.
pub mod bundle;
/// CAS catalog (`cas.cat`) entries
pub mod catalog;
/// DbObject binary documents
pub mod dbobject;
/// Document header sniffing and deobfuscation
pub mod header;
/// GUID and SHA-1 key types
pub mod keys;
/// Top-level layout document
pub mod layout;
/// Update package manifests
pub mod package;
/// Superbundle table of contents
pub mod toc;

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use keys::{Guid, Sha1};

/// Common format trait that all formats should implement
pub trait FrostFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
