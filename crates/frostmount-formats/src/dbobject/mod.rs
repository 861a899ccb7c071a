//! DbObject binary key/value documents
//!
//! Every table-of-contents, layout, package manifest and content-addressed
//! bundle body is stored as a DbObject tree. Each entry starts with a tag
//! byte whose low five bits select the value type; bit `0x80` marks an
//! anonymous entry (list items and document roots). Named entries follow the
//! tag with a NUL-terminated name.
//!
//! | Code | Type | Payload |
//! |------|------|---------|
//! | 0x01 | list | LEB128 size, anonymous children, `0x00` |
//! | 0x02 | object | LEB128 size, named children, `0x00` |
//! | 0x06 | bool | 1 byte |
//! | 0x07 | string | LEB128 length (incl. NUL), bytes |
//! | 0x08 | int | i32 LE |
//! | 0x09 | long | i64 LE |
//! | 0x0B | float | f32 LE |
//! | 0x0C | double | f64 LE |
//! | 0x0F | guid | 16 bytes |
//! | 0x10 | sha1 | 20 bytes |
//! | 0x13 | blob | LEB128 length, bytes |

mod error;
mod reader;
mod writer;

pub use error::{DbError, DbResult};
pub use reader::{DbReader, MAX_DEPTH};
pub use writer::DbWriter;

use crate::keys::{Guid, Sha1};

/// Terminates a list or object
pub const TYPE_END: u8 = 0x00;
/// List of anonymous values
pub const TYPE_LIST: u8 = 0x01;
/// Object of named values
pub const TYPE_OBJECT: u8 = 0x02;
/// Boolean
pub const TYPE_BOOL: u8 = 0x06;
/// Length-prefixed string
pub const TYPE_STRING: u8 = 0x07;
/// 32-bit integer
pub const TYPE_INT: u8 = 0x08;
/// 64-bit integer
pub const TYPE_LONG: u8 = 0x09;
/// 32-bit float
pub const TYPE_FLOAT: u8 = 0x0B;
/// 64-bit float
pub const TYPE_DOUBLE: u8 = 0x0C;
/// 128-bit identifier
pub const TYPE_GUID: u8 = 0x0F;
/// SHA-1 digest
pub const TYPE_SHA1: u8 = 0x10;
/// Length-prefixed byte array
pub const TYPE_BLOB: u8 = 0x13;
/// Tag flag for entries without a name
pub const FLAG_ANONYMOUS: u8 = 0x80;
/// Mask selecting the type code from a tag byte
pub const TYPE_MASK: u8 = 0x1F;

/// A single DbObject value
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// Ordered anonymous values
    List(Vec<DbValue>),
    /// Ordered named values
    Object(DbObject),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    String(String),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// 128-bit identifier
    Guid(Guid),
    /// SHA-1 digest
    Sha1(Sha1),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl DbValue {
    /// Parse a single anonymous value from a byte slice
    pub fn parse(data: &[u8]) -> DbResult<Self> {
        let mut cursor = std::io::Cursor::new(data);
        DbReader::new(&mut cursor)?.read_value()
    }

    /// Parse a document whose root must be an object
    pub fn parse_object(data: &[u8]) -> DbResult<DbObject> {
        Self::parse(data)?.into_object()
    }

    /// Serialize as an anonymous value
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        DbWriter::new(&mut out).write_value(None, self);
        out
    }

    /// Name of the value's type, for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Guid(_) => "guid",
            Self::Sha1(_) => "sha1",
            Self::Blob(_) => "blob",
        }
    }

    /// Type code written to the tag byte
    pub const fn type_code(&self) -> u8 {
        match self {
            Self::List(_) => TYPE_LIST,
            Self::Object(_) => TYPE_OBJECT,
            Self::Bool(_) => TYPE_BOOL,
            Self::String(_) => TYPE_STRING,
            Self::Int(_) => TYPE_INT,
            Self::Long(_) => TYPE_LONG,
            Self::Float(_) => TYPE_FLOAT,
            Self::Double(_) => TYPE_DOUBLE,
            Self::Guid(_) => TYPE_GUID,
            Self::Sha1(_) => TYPE_SHA1,
            Self::Blob(_) => TYPE_BLOB,
        }
    }

    /// Consume into an object, failing for any other type
    pub fn into_object(self) -> DbResult<DbObject> {
        match self {
            Self::Object(object) => Ok(object),
            other => Err(DbError::RootNotObject(other.type_name())),
        }
    }

    /// Borrow as an object
    pub const fn as_object(&self) -> Option<&DbObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrow as a list
    pub fn as_list(&self) -> Option<&[DbValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value, widening 32-bit ints
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Identifier value
    pub const fn as_guid(&self) -> Option<Guid> {
        match self {
            Self::Guid(v) => Some(*v),
            _ => None,
        }
    }

    /// Digest value
    pub const fn as_sha1(&self) -> Option<Sha1> {
        match self {
            Self::Sha1(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw bytes
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Guid> for DbValue {
    fn from(v: Guid) -> Self {
        Self::Guid(v)
    }
}

impl From<Sha1> for DbValue {
    fn from(v: Sha1) -> Self {
        Self::Sha1(v)
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<DbObject> for DbValue {
    fn from(v: DbObject) -> Self {
        Self::Object(v)
    }
}

impl From<Vec<DbValue>> for DbValue {
    fn from(v: Vec<DbValue>) -> Self {
        Self::List(v)
    }
}

/// Named entry of an object
#[derive(Debug, Clone, PartialEq)]
pub struct DbField {
    /// Entry name
    pub name: String,
    /// Entry value
    pub value: DbValue,
}

/// Ordered collection of named values
///
/// Lookups are exact-match on the name; the first entry wins when a name
/// repeats.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbObject {
    fields: Vec<DbField>,
}

impl DbObject {
    /// Create an empty object
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field, builder style
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<DbValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Append a field
    pub fn insert(&mut self, name: &str, value: impl Into<DbValue>) {
        self.fields.push(DbField {
            name: name.to_string(),
            value: value.into(),
        });
    }

    /// Fields in document order
    pub fn fields(&self) -> &[DbField] {
        &self.fields
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the object has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by name
    pub fn get_field(&self, name: &str) -> Option<&DbField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a value by name
    pub fn get(&self, name: &str) -> Option<&DbValue> {
        self.get_field(name).map(|f| &f.value)
    }

    /// Whether a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// String field
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(DbValue::as_str)
    }

    /// Integer field (int or long)
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(DbValue::as_int)
    }

    /// Boolean field
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(DbValue::as_bool)
    }

    /// List field
    pub fn get_list(&self, name: &str) -> Option<&[DbValue]> {
        self.get(name).and_then(DbValue::as_list)
    }

    /// Object field
    pub fn get_object(&self, name: &str) -> Option<&DbObject> {
        self.get(name).and_then(DbValue::as_object)
    }

    /// Identifier field
    pub fn get_guid(&self, name: &str) -> Option<Guid> {
        self.get(name).and_then(DbValue::as_guid)
    }

    /// Digest field
    pub fn get_sha1(&self, name: &str) -> Option<Sha1> {
        self.get(name).and_then(DbValue::as_sha1)
    }

    /// Blob field
    pub fn get_blob(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(DbValue::as_blob)
    }

    /// Required field of any type
    pub fn require(&self, name: &str) -> DbResult<&DbValue> {
        self.get(name)
            .ok_or_else(|| DbError::MissingField(name.to_string()))
    }

    /// Required string field
    pub fn require_str(&self, name: &str) -> DbResult<&str> {
        let value = self.require(name)?;
        value
            .as_str()
            .ok_or_else(|| unexpected(name, "string", value))
    }

    /// Required integer field
    pub fn require_int(&self, name: &str) -> DbResult<i64> {
        let value = self.require(name)?;
        value.as_int().ok_or_else(|| unexpected(name, "int", value))
    }

    /// Required non-negative integer field
    pub fn require_u64(&self, name: &str) -> DbResult<u64> {
        let value = self.require(name)?;
        value
            .as_int()
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| unexpected(name, "non-negative integer", value))
    }

    /// Optional non-negative integer field, zero when absent
    pub fn u64_or_zero(&self, name: &str) -> DbResult<u64> {
        if self.contains(name) {
            self.require_u64(name)
        } else {
            Ok(0)
        }
    }

    /// Required boolean field
    pub fn require_bool(&self, name: &str) -> DbResult<bool> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| unexpected(name, "bool", value))
    }

    /// Required identifier field
    pub fn require_guid(&self, name: &str) -> DbResult<Guid> {
        let value = self.require(name)?;
        value.as_guid().ok_or_else(|| unexpected(name, "guid", value))
    }

    /// Required digest field
    pub fn require_sha1(&self, name: &str) -> DbResult<Sha1> {
        let value = self.require(name)?;
        value.as_sha1().ok_or_else(|| unexpected(name, "sha1", value))
    }

    /// Optional list field that must be a list when present
    pub fn list_or_empty(&self, name: &str) -> DbResult<&[DbValue]> {
        match self.get(name) {
            None => Ok(&[]),
            Some(value) => value
                .as_list()
                .ok_or_else(|| unexpected(name, "list", value)),
        }
    }

    /// Optional boolean field that must be a bool when present
    pub fn bool_or(&self, name: &str, default: bool) -> DbResult<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.as_bool().ok_or_else(|| unexpected(name, "bool", value)),
        }
    }
}

fn unexpected(field: &str, expected: &'static str, found: &DbValue) -> DbError {
    DbError::UnexpectedType {
        field: field.to_string(),
        expected,
        found: found.type_name(),
    }
}

/// Interpret list items as objects, naming the list in errors
pub fn objects<'a>(list_name: &str, items: &'a [DbValue]) -> DbResult<Vec<&'a DbObject>> {
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| unexpected(list_name, "list of objects", item))
        })
        .collect()
}
