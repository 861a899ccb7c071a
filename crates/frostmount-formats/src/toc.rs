//! Superbundle table of contents
//!
//! Each `.toc` lists the bundles stored in the sibling `.sb` file and the
//! chunks addressed by GUID. Record order is preserved so a rebuilt document
//! is byte-identical to the one that was parsed.

use crate::FrostFormat;
use crate::dbobject::{DbObject, DbResult, DbValue, objects};
use crate::keys::Guid;

/// Parsed table of contents
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TocFile {
    /// Optional superbundle name stored in the document
    pub name: Option<String>,
    /// Bundle bodies are content-addressed documents
    pub content_addressed: bool,
    /// Bundle records in document order
    pub bundles: Vec<TocBundle>,
    /// Chunk records in document order
    pub chunks: Vec<TocChunk>,
}

/// One `bundles` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocBundle {
    /// Bundle name as stored (not case-folded)
    pub id: String,
    /// Byte offset in the `.sb` file
    pub offset: u64,
    /// Byte size in the `.sb` file
    pub size: u64,
    /// Unchanged copy of the base bundle
    pub base: bool,
    /// Incremental patch record
    pub delta: bool,
}

/// One `chunks` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocChunk {
    /// Chunk identifier
    pub id: Guid,
    /// Byte offset in the `.sb` file
    pub offset: u64,
    /// Byte size in the `.sb` file
    pub size: u64,
}

impl TocBundle {
    /// Plain bundle record
    pub fn new(id: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            id: id.into(),
            offset,
            size,
            base: false,
            delta: false,
        }
    }

    /// Mark as an unchanged base carryover
    #[must_use]
    pub const fn with_base(mut self, base: bool) -> Self {
        self.base = base;
        self
    }

    /// Mark as an incremental patch record
    #[must_use]
    pub const fn with_delta(mut self, delta: bool) -> Self {
        self.delta = delta;
        self
    }
}

impl TocFile {
    /// Read from a parsed document
    pub fn from_object(object: &DbObject) -> DbResult<Self> {
        let bundles = objects("bundles", object.list_or_empty("bundles")?)?
            .into_iter()
            .map(|b| {
                Ok(TocBundle {
                    id: b.require_str("id")?.to_string(),
                    offset: b.require_u64("offset")?,
                    size: b.require_u64("size")?,
                    base: b.bool_or("base", false)?,
                    delta: b.bool_or("delta", false)?,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        let chunks = objects("chunks", object.list_or_empty("chunks")?)?
            .into_iter()
            .map(|c| {
                Ok(TocChunk {
                    id: c.require_guid("id")?,
                    offset: c.require_u64("offset")?,
                    size: c.require_u64("size")?,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Self {
            name: object.get_str("name").map(ToString::to_string),
            content_addressed: object.bool_or("cas", false)?,
            bundles,
            chunks,
        })
    }

    /// Convert back to a document
    pub fn to_object(&self) -> DbObject {
        let mut object = DbObject::new();
        if let Some(name) = &self.name {
            object.insert("name", name.as_str());
        }
        if self.content_addressed {
            object.insert("cas", true);
        }

        let bundles = self
            .bundles
            .iter()
            .map(|b| {
                let mut record = DbObject::new()
                    .with("id", b.id.as_str())
                    .with("offset", to_long(b.offset))
                    .with("size", to_long(b.size));
                if b.base {
                    record.insert("base", true);
                }
                if b.delta {
                    record.insert("delta", true);
                }
                DbValue::from(record)
            })
            .collect::<Vec<_>>();
        object.insert("bundles", bundles);

        let chunks = self
            .chunks
            .iter()
            .map(|c| {
                DbValue::from(
                    DbObject::new()
                        .with("id", c.id)
                        .with("offset", to_long(c.offset))
                        .with("size", to_long(c.size)),
                )
            })
            .collect::<Vec<_>>();
        object.insert("chunks", chunks);
        object
    }
}

fn to_long(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl FrostFormat for TocFile {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::from_object(&DbValue::parse_object(data)?)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(DbValue::Object(self.to_object()).build())
    }
}
