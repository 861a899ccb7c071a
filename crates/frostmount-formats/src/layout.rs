//! Top-level `layout.toc` document
//!
//! Lists every superbundle the game ships, the optional filesystem entries
//! and the `head`/`base` stamps that decide whether a patch layout applies to
//! the installed base.

use crate::FrostFormat;
use crate::dbobject::{DbObject, DbResult, DbValue, objects};

/// Parsed layout document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutFile {
    /// Build stamp of this layout
    pub head: Option<i64>,
    /// Stamp of the base build this layout patches
    pub base: Option<i64>,
    /// Declared superbundles in document order
    pub superbundles: Vec<LayoutSuperbundle>,
    /// Filesystem entry paths
    pub filesystems: Vec<String>,
}

/// One `superBundles` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSuperbundle {
    /// Superbundle name, e.g. `win32/globals`
    pub name: String,
}

impl LayoutFile {
    /// Read from a parsed document
    pub fn from_object(object: &DbObject) -> DbResult<Self> {
        let superbundles = objects("superBundles", object.list_or_empty("superBundles")?)?
            .into_iter()
            .map(|sb| {
                Ok(LayoutSuperbundle {
                    name: sb.require_str("name")?.to_string(),
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        // `fs` entries are plain strings in current layouts and `{name}` records in older ones
        let filesystems = object
            .list_or_empty("fs")?
            .iter()
            .filter_map(|item| match item {
                DbValue::String(path) => Some(path.clone()),
                DbValue::Object(fs) => fs.get_str("name").map(ToString::to_string),
                _ => None,
            })
            .collect();

        Ok(Self {
            head: object.get_int("head"),
            base: object.get_int("base"),
            superbundles,
            filesystems,
        })
    }

    /// Convert back to a document
    pub fn to_object(&self) -> DbObject {
        let mut object = DbObject::new();
        if let Some(head) = self.head {
            object.insert("head", head);
        }
        if let Some(base) = self.base {
            object.insert("base", base);
        }
        object.insert(
            "superBundles",
            self.superbundles
                .iter()
                .map(|sb| DbValue::from(DbObject::new().with("name", sb.name.as_str())))
                .collect::<Vec<_>>(),
        );
        if !self.filesystems.is_empty() {
            object.insert(
                "fs",
                self.filesystems
                    .iter()
                    .map(|fs| DbValue::from(fs.as_str()))
                    .collect::<Vec<_>>(),
            );
        }
        object
    }

    /// Whether this patch layout was built against `base`
    ///
    /// A missing stamp on either side never matches.
    pub fn applies_to(&self, base: &Self) -> bool {
        matches!((self.base, base.head), (Some(patch), Some(installed)) if patch == installed)
    }

    /// Find a superbundle by exact name
    pub fn superbundle(&self, name: &str) -> Option<&LayoutSuperbundle> {
        self.superbundles.iter().find(|sb| sb.name == name)
    }
}

impl FrostFormat for LayoutFile {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::from_object(&DbValue::parse_object(data)?)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(DbValue::Object(self.to_object()).build())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::test_round_trip;

    fn layout(head: Option<i64>, base: Option<i64>) -> LayoutFile {
        LayoutFile {
            head,
            base,
            superbundles: vec![LayoutSuperbundle {
                name: "win32/globals".to_string(),
            }],
            filesystems: vec!["initfs_win32".to_string()],
        }
    }

    #[test]
    fn test_round_trip_layout() {
        test_round_trip(&layout(Some(7), None)).expect("round trip");
        let bytes = layout(Some(9), Some(7)).build().expect("build");
        LayoutFile::verify_round_trip(&bytes).expect("byte identical");
    }

    #[test]
    fn test_stamp_comparison() {
        let base = layout(Some(7), None);
        assert!(layout(Some(9), Some(7)).applies_to(&base));
        assert!(!layout(Some(9), Some(6)).applies_to(&base));
        assert!(!layout(Some(9), None).applies_to(&base));
        assert!(!layout(Some(9), Some(7)).applies_to(&layout(None, None)));
    }

    #[test]
    fn test_legacy_fs_records_and_missing_sections() {
        let object = DbObject::new().with(
            "fs",
            vec![DbValue::from(DbObject::new().with("name", "initfs_win32"))],
        );
        let parsed = LayoutFile::from_object(&object).expect("parse");
        assert!(parsed.superbundles.is_empty());
        assert_eq!(parsed.filesystems, vec!["initfs_win32".to_string()]);
        assert_eq!(parsed.head, None);
    }

    #[test]
    fn test_superbundle_without_name_rejected() {
        let object = DbObject::new().with("superBundles", vec![DbValue::from(DbObject::new())]);
        assert!(LayoutFile::from_object(&object).is_err());
    }
}
