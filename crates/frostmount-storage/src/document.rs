//! Reading header-wrapped DbObject documents through the file system

use frostmount_formats::dbobject::{DbObject, DbValue};
use frostmount_formats::header::{HeaderError, read_document_body};
use std::io::{Read, Seek};
use tracing::debug;

use crate::vfs::GameFileSystem;
use crate::{MountError, Result};

/// Open `path`, unwrap its header and parse the root object
///
/// A file that cannot be opened is a [`MountError::RecoverableLookup`];
/// unknown header magic is a [`MountError::UnsupportedFormat`].
pub(crate) fn read_document(fs: &dyn GameFileSystem, path: &str) -> Result<DbObject> {
    let mut reader = fs
        .open_file_read(path)
        .map_err(|e| MountError::RecoverableLookup(format!("{path}: {e}")))?;
    parse_document(path, &mut reader)
}

/// Unwrap the header of an already opened document and parse the root object
pub(crate) fn parse_document<R: Read + Seek>(path: &str, reader: &mut R) -> Result<DbObject> {
    let (kind, body) = read_document_body(reader).map_err(|e| match e {
        HeaderError::UnknownMagic(magic) => MountError::UnsupportedFormat {
            context: path.to_string(),
            reason: format!("unknown header magic 0x{magic:08X}"),
        },
        other => MountError::Header(other),
    })?;
    debug!("Read {path} ({kind:?}, {} byte body)", body.len());

    Ok(DbValue::parse_object(&body)?)
}
