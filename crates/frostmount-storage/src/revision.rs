//! Engine revision codecs
//!
//! Table-of-contents and bundle body parsing differ between engine
//! revisions. Each supported revision provides a [`RevisionCodec`]; the
//! loader picks one from [`crate::LoaderConfig::engine`].

use frostmount_formats::bundle::{Bundle, read_cas_body, read_classic_bundle};
use frostmount_formats::dbobject::DbObject;
use frostmount_formats::toc::TocFile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Seek, SeekFrom};
use std::str::FromStr;
use tracing::debug;

use crate::bundle::delta::{DeltaMerge, KeyedOverlayMerge};
use crate::superbundle::{BundleEntry, LayoutKind, SuperbundleLayout};
use crate::vfs::FileReader;
use crate::{MountError, Result};

/// Supported engine revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EngineRevision {
    /// Frostbite 2013.2
    #[default]
    #[serde(rename = "frostbite-2013.2")]
    Frostbite2013_2,
}

impl EngineRevision {
    /// Every supported revision
    pub const ALL: [Self; 1] = [Self::Frostbite2013_2];

    /// Configuration tag
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Frostbite2013_2 => "frostbite-2013.2",
        }
    }

    /// Codec for this revision
    pub fn codec(self) -> &'static dyn RevisionCodec {
        match self {
            Self::Frostbite2013_2 => &Frostbite2013_2Codec,
        }
    }
}

impl fmt::Display for EngineRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frostbite2013_2 => f.write_str("Frostbite 2013.2"),
        }
    }
}

impl FromStr for EngineRevision {
    type Err = MountError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|revision| revision.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| MountError::FatalConfiguration(format!("unknown engine revision: {s}")))
    }
}

/// Per-revision parsing capabilities
pub trait RevisionCodec: Send + Sync {
    /// Revision this codec implements
    fn revision(&self) -> EngineRevision;

    /// Build a layout from a table-of-contents document
    fn parse_toc(&self, document: &DbObject, kind: LayoutKind, name: &str)
    -> Result<SuperbundleLayout>;

    /// Read one bundle body from the superbundle data file that owns `entry`
    fn parse_bundle_body(
        &self,
        reader: &mut FileReader,
        entry: &BundleEntry,
        content_addressed: bool,
    ) -> Result<Bundle>;

    /// Record-level merge used for incremental patches
    fn delta_merge(&self) -> &dyn DeltaMerge;
}

/// Codec for [`EngineRevision::Frostbite2013_2`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Frostbite2013_2Codec;

impl RevisionCodec for Frostbite2013_2Codec {
    fn revision(&self) -> EngineRevision {
        EngineRevision::Frostbite2013_2
    }

    fn parse_toc(
        &self,
        document: &DbObject,
        kind: LayoutKind,
        name: &str,
    ) -> Result<SuperbundleLayout> {
        let toc = TocFile::from_object(document)?;
        debug!(
            "Parsed {kind:?} toc for {name}: {} bundles, {} chunks, cas={}",
            toc.bundles.len(),
            toc.chunks.len(),
            toc.content_addressed
        );
        Ok(SuperbundleLayout::from_toc(name, &toc, kind))
    }

    fn parse_bundle_body(
        &self,
        reader: &mut FileReader,
        entry: &BundleEntry,
        content_addressed: bool,
    ) -> Result<Bundle> {
        reader.seek(SeekFrom::Start(entry.offset))?;
        let parsed = if content_addressed {
            read_cas_body(reader, entry.size)
        } else {
            read_classic_bundle(reader, &entry.id)
        };
        parsed.map_err(|e| MountError::from_bundle(&entry.id, e))
    }

    fn delta_merge(&self) -> &dyn DeltaMerge {
        &KeyedOverlayMerge
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use frostmount_formats::bundle::{ClassicBundleBuilder, MAGIC_DBX_MODE, cas_body_object};
    use frostmount_formats::keys::Sha1;
    use frostmount_formats::toc::TocBundle;
    use std::io::Cursor;

    fn entry(id: &str, offset: u64, size: u64) -> BundleEntry {
        BundleEntry::from_toc(&TocBundle::new(id, offset, size), LayoutKind::Base)
    }

    #[test]
    fn test_revision_tags() {
        assert_eq!(
            "Frostbite-2013.2".parse::<EngineRevision>().expect("known tag"),
            EngineRevision::Frostbite2013_2
        );
        assert!(matches!(
            "frostbite-2009".parse::<EngineRevision>(),
            Err(MountError::FatalConfiguration(_))
        ));
        assert_eq!(EngineRevision::Frostbite2013_2.to_string(), "Frostbite 2013.2");
        assert_eq!(
            EngineRevision::Frostbite2013_2.codec().revision(),
            EngineRevision::Frostbite2013_2
        );
    }

    #[test]
    fn test_parse_toc_indexes_bundles() {
        let toc = TocFile {
            name: Some("win32/globals".into()),
            content_addressed: true,
            bundles: vec![TocBundle::new("Win32/Globals", 0, 32)],
            chunks: vec![],
        };
        let layout = Frostbite2013_2Codec
            .parse_toc(&toc.to_object(), LayoutKind::Authoritative, "win32/globals")
            .expect("valid toc");
        assert!(layout.is_content_addressed());
        assert!(layout.is_authoritative());
        assert!(layout.bundle("win32/globals").is_some());
    }

    #[test]
    fn test_classic_body_read_at_offset() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("levels/mp_siege", vec![1u8; 5]);
        let body = builder.build().expect("build");

        let mut data = vec![0xEEu8; 100];
        data.extend_from_slice(&body);
        let mut reader: FileReader = Box::new(Cursor::new(data));

        let bundle = Frostbite2013_2Codec
            .parse_bundle_body(
                &mut reader,
                &entry("win32/levels/mp_siege", 100, body.len() as u64),
                false,
            )
            .expect("classic body");
        assert_eq!(bundle.path, "win32/levels/mp_siege");
        assert_eq!(bundle.ebx[0].name, "levels/mp_siege");
    }

    #[test]
    fn test_cas_body_read_at_offset() {
        let mut source = Bundle::new("win32/ui");
        source.total_size = 64;
        source.ebx.push(frostmount_formats::bundle::EbxEntry {
            name: "ui/hud".into(),
            sha1: Sha1::from_bytes([3; 20]),
            size: 10,
            original_size: 20,
            payload: None,
        });
        let body = frostmount_formats::dbobject::DbValue::Object(cas_body_object(&source)).build();

        let mut data = vec![0u8; 16];
        data.extend_from_slice(&body);
        let mut reader: FileReader = Box::new(Cursor::new(data));

        let bundle = Frostbite2013_2Codec
            .parse_bundle_body(&mut reader, &entry("win32/ui", 16, body.len() as u64), true)
            .expect("cas body");
        assert_eq!(bundle, source);
    }

    #[test]
    fn test_dbx_mode_is_unsupported_format() {
        let mut builder = ClassicBundleBuilder::new();
        builder.set_magic(MAGIC_DBX_MODE);
        let body = builder.build().expect("build");
        let mut reader: FileReader = Box::new(Cursor::new(body.clone()));

        let error = Frostbite2013_2Codec
            .parse_bundle_body(&mut reader, &entry("win32/old", 0, body.len() as u64), false)
            .unwrap_err();
        assert!(matches!(error, MountError::UnsupportedFormat { .. }));
    }
}
