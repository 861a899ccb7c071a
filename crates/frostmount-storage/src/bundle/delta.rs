//! Record-level merging for incremental bundle patches

use frostmount_formats::bundle::Bundle;
use frostmount_formats::keys::Guid;
use std::collections::HashMap;
use std::hash::Hash;

use crate::revision::EngineRevision;
use crate::{MountError, Result};

/// Applies an incremental overlay bundle on top of its base bundle
///
/// Implementations must keep every base member the overlay does not
/// mention.
pub trait DeltaMerge: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Produce the merged bundle
    fn merge(&self, base: Bundle, overlay: Bundle) -> Result<Bundle>;
}

/// Keyed replace-or-append merge
///
/// Ebx and resource members match by lower-cased name, chunk members by id.
/// A matching overlay member replaces the base member in place; unmatched
/// overlay members are appended in overlay order. The bundle header
/// (path, salt, alignment, total size) stays the base one.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyedOverlayMerge;

impl DeltaMerge for KeyedOverlayMerge {
    fn name(&self) -> &'static str {
        "keyed-overlay"
    }

    fn merge(&self, mut base: Bundle, overlay: Bundle) -> Result<Bundle> {
        overlay_members(&mut base.ebx, overlay.ebx, |e| e.name.to_lowercase());
        overlay_members(&mut base.res, overlay.res, |r| r.name.to_lowercase());
        overlay_members(&mut base.chunks, overlay.chunks, |c| c.id);
        Ok(base)
    }
}

fn overlay_members<T, K, F>(base: &mut Vec<T>, overlay: Vec<T>, key: F)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = base
        .iter()
        .enumerate()
        .map(|(i, member)| (key(member), i))
        .collect();

    for member in overlay {
        let k = key(&member);
        if let Some(&i) = index.get(&k) {
            base[i] = member;
        } else {
            index.insert(k, base.len());
            base.push(member);
        }
    }
}

/// Refuses incremental patches for revisions without a defined merge
#[derive(Debug, Clone, Copy)]
pub struct RejectDeltaMerge {
    /// Revision reported in the error
    pub revision: EngineRevision,
}

impl DeltaMerge for RejectDeltaMerge {
    fn name(&self) -> &'static str {
        "reject"
    }

    fn merge(&self, _base: Bundle, _overlay: Bundle) -> Result<Bundle> {
        Err(MountError::Unsupported {
            revision: self.revision,
            feature: "incremental bundle patches",
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use frostmount_formats::bundle::{BundleChunk, EbxEntry, ResourceEntry};
    use frostmount_formats::keys::Sha1;
    use pretty_assertions::assert_eq;

    fn ebx(name: &str, seed: u8) -> EbxEntry {
        EbxEntry {
            name: name.into(),
            sha1: Sha1::from_bytes([seed; 20]),
            size: u64::from(seed),
            original_size: u64::from(seed),
            payload: Some(Bytes::from(vec![seed; 4])),
        }
    }

    fn res(name: &str, seed: u8) -> ResourceEntry {
        ResourceEntry {
            name: name.into(),
            sha1: Sha1::from_bytes([seed; 20]),
            size: 1,
            original_size: 1,
            res_type: 0x5C4954A6,
            res_meta: vec![0; 16],
            res_rid: u64::from(seed),
            payload: None,
        }
    }

    fn chunk(id: u8, seed: u8) -> BundleChunk {
        BundleChunk {
            id: Guid::from_bytes([id; 16]),
            sha1: Sha1::from_bytes([seed; 20]),
            size: 16,
            logical_offset: 0,
            logical_size: 16,
            meta: None,
            payload: None,
        }
    }

    #[test]
    fn test_overlay_replaces_in_place_and_appends() {
        let mut base = Bundle::new("win32/ui");
        base.magic_salt = 7;
        base.ebx = vec![ebx("ui/a", 1), ebx("ui/b", 2), ebx("ui/c", 3)];
        base.res = vec![res("ui/tex", 1)];
        base.chunks = vec![chunk(1, 1), chunk(2, 2)];

        let mut overlay = Bundle::new("win32/ui");
        overlay.magic_salt = 99;
        overlay.ebx = vec![ebx("UI/B", 20), ebx("ui/d", 4)];
        overlay.chunks = vec![chunk(2, 22)];

        let merged = KeyedOverlayMerge.merge(base, overlay).expect("merge");

        assert_eq!(merged.magic_salt, 7);
        let names: Vec<_> = merged.ebx.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["ui/a", "UI/B", "ui/c", "ui/d"]);
        assert_eq!(merged.ebx[1].size, 20);
        assert_eq!(merged.res, vec![res("ui/tex", 1)]);
        assert_eq!(merged.chunks.len(), 2);
        assert_eq!(merged.chunks[1].sha1, Sha1::from_bytes([22; 20]));
    }

    #[test]
    fn test_empty_overlay_keeps_base() {
        let mut base = Bundle::new("win32/ui");
        base.ebx = vec![ebx("ui/a", 1)];
        base.res = vec![res("ui/tex", 1)];
        let merged = KeyedOverlayMerge
            .merge(base.clone(), Bundle::new("win32/ui"))
            .expect("merge");
        assert_eq!(merged, base);
    }

    #[test]
    fn test_reject_reports_revision() {
        let merge = RejectDeltaMerge {
            revision: EngineRevision::Frostbite2013_2,
        };
        let error = merge
            .merge(Bundle::default(), Bundle::default())
            .unwrap_err();
        assert!(matches!(error, MountError::Unsupported { .. }));
        assert!(error.to_string().contains("Frostbite 2013.2"));
    }
}
