//! Package manifest (`Update/<dir>/package.mft`)

use crate::FrostFormat;
use crate::dbobject::{DbObject, DbResult, DbValue};

/// Parsed package manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    /// Package name
    pub name: String,
    /// Whether this package overrides the base layout
    pub authoritative: bool,
    /// Content path relative to the game root
    pub path: Option<String>,
}

impl PackageManifest {
    /// Read from a parsed document
    pub fn from_object(object: &DbObject) -> DbResult<Self> {
        Ok(Self {
            name: object.require_str("name")?.to_string(),
            authoritative: object.bool_or("authoritative", false)?,
            path: object.get_str("path").map(ToString::to_string),
        })
    }

    /// Convert back to a document
    pub fn to_object(&self) -> DbObject {
        let mut object = DbObject::new()
            .with("name", self.name.as_str())
            .with("authoritative", self.authoritative);
        if let Some(path) = &self.path {
            object.insert("path", path.as_str());
        }
        object
    }

    /// Content path, defaulting to `/Update/<dir_name>`
    pub fn content_path(&self, dir_name: &str) -> String {
        match &self.path {
            Some(path) if path.starts_with('/') => path.clone(),
            Some(path) => format!("/{path}"),
            None => format!("/Update/{dir_name}"),
        }
    }
}

impl FrostFormat for PackageManifest {
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

    #[test]
    fn test_default_content_path() {
        let manifest = PackageManifest {
            name: "Patch".to_string(),
            authoritative: true,
            path: None,
        };
        test_round_trip(&manifest).expect("round trip");
        assert_eq!(manifest.content_path("Patch"), "/Update/Patch");
    }

    #[test]
    fn test_explicit_content_path() {
        let manifest = PackageManifest {
            name: "xp1".to_string(),
            authoritative: false,
            path: Some("Update/Xpack1".to_string()),
        };
        assert_eq!(manifest.content_path("xp1"), "/Update/Xpack1");
    }

    #[test]
    fn test_authoritative_defaults_false() {
        let object = DbObject::new().with("name", "xp2");
        let manifest = PackageManifest::from_object(&object).expect("parse");
        assert!(!manifest.authoritative);
    }
}
