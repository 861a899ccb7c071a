//! Content-addressed bundle bodies

use binrw::io::{Read, Seek};

use super::error::{BundleError, BundleResult};
use super::{Bundle, BundleChunk, EbxEntry, ResourceEntry};
use crate::dbobject::{DbObject, DbReader, DbValue, objects};

/// Read a body of `size` bytes at the reader's position
///
/// Only the first document in the range describes the bundle.
pub fn read_cas_body<R: Read + Seek>(reader: &mut R, size: u64) -> BundleResult<Bundle> {
    let values = DbReader::with_limit(reader, size)?.read_all()?;
    let object = values
        .into_iter()
        .next()
        .ok_or(BundleError::EmptyBody)?
        .into_object()?;
    cas_body_from_object(&object)
}

/// Interpret a bundle document
pub fn cas_body_from_object(object: &DbObject) -> BundleResult<Bundle> {
    if !object.list_or_empty("dbx")?.is_empty() {
        return Err(BundleError::DbxMode);
    }

    let mut bundle = Bundle::new(object.require_str("path")?);
    bundle.magic_salt = object.require_int("magicSalt")? as u32;
    bundle.align_members = object.require_bool("alignMembers")?;
    bundle.total_size = object.require_u64("totalSize")?;

    for item in objects("ebx", object.list_or_empty("ebx")?)? {
        bundle.ebx.push(EbxEntry {
            name: item.require_str("name")?.to_string(),
            sha1: item.require_sha1("sha1")?,
            size: item.u64_or_zero("size")?,
            original_size: item.u64_or_zero("originalSize")?,
            payload: None,
        });
    }

    for item in objects("res", object.list_or_empty("res")?)? {
        bundle.res.push(ResourceEntry {
            name: item.require_str("name")?.to_string(),
            sha1: item.require_sha1("sha1")?,
            size: item.u64_or_zero("size")?,
            original_size: item.u64_or_zero("originalSize")?,
            res_type: item.get_int("resType").unwrap_or(0) as u32,
            res_meta: item.get_blob("resMeta").map(<[u8]>::to_vec).unwrap_or_default(),
            res_rid: item.get_int("resRid").unwrap_or(0) as u64,
            payload: None,
        });
    }

    let chunk_meta = objects("chunkMeta", object.list_or_empty("chunkMeta")?)?;
    for (index, item) in objects("chunks", object.list_or_empty("chunks")?)?
        .into_iter()
        .enumerate()
    {
        bundle.chunks.push(BundleChunk {
            id: item.require_guid("id")?,
            sha1: item.require_sha1("sha1")?,
            size: item.u64_or_zero("size")?,
            logical_offset: item.u64_or_zero("logicalOffset")? as u32,
            logical_size: item.u64_or_zero("logicalSize")? as u32,
            meta: chunk_meta.get(index).map(|m| (*m).clone()),
            payload: None,
        });
    }

    Ok(bundle)
}

/// Describe a bundle as a content-addressed body document
pub fn cas_body_object(bundle: &Bundle) -> DbObject {
    let mut object = DbObject::new()
        .with("path", bundle.path.as_str())
        .with("magicSalt", bundle.magic_salt as i32)
        .with("alignMembers", bundle.align_members)
        .with("totalSize", bundle.total_size as i64);

    if !bundle.ebx.is_empty() {
        let items = bundle
            .ebx
            .iter()
            .map(|e| {
                DbValue::from(
                    DbObject::new()
                        .with("name", e.name.as_str())
                        .with("sha1", e.sha1)
                        .with("size", e.size as i64)
                        .with("originalSize", e.original_size as i64),
                )
            })
            .collect::<Vec<_>>();
        object.insert("ebx", items);
    }

    if !bundle.res.is_empty() {
        let items = bundle
            .res
            .iter()
            .map(|r| {
                DbValue::from(
                    DbObject::new()
                        .with("name", r.name.as_str())
                        .with("sha1", r.sha1)
                        .with("size", r.size as i64)
                        .with("originalSize", r.original_size as i64)
                        .with("resType", r.res_type as i32)
                        .with("resMeta", r.res_meta.clone())
                        .with("resRid", r.res_rid as i64),
                )
            })
            .collect::<Vec<_>>();
        object.insert("res", items);
    }

    if !bundle.chunks.is_empty() {
        let items = bundle
            .chunks
            .iter()
            .map(|c| {
                DbValue::from(
                    DbObject::new()
                        .with("id", c.id)
                        .with("sha1", c.sha1)
                        .with("size", c.size as i64)
                        .with("logicalOffset", c.logical_offset as i32)
                        .with("logicalSize", c.logical_size as i32),
                )
            })
            .collect::<Vec<_>>();
        object.insert("chunks", items);

        if bundle.chunks.iter().any(|c| c.meta.is_some()) {
            let meta = bundle
                .chunks
                .iter()
                .map(|c| DbValue::from(c.meta.clone().unwrap_or_default()))
                .collect::<Vec<_>>();
            object.insert("chunkMeta", meta);
        }
    }

    object
}
