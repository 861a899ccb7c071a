//! Classic record stream

use binrw::io::{Read, Seek, SeekFrom};
use bytes::Bytes;

use super::error::{BundleError, BundleResult};
use super::manifest::ClassicManifest;
use super::{Bundle, BundleChunk, EbxEntry, ResourceEntry};

/// Padding needed to reach the next 16-byte boundary
pub const fn padding_for(position: u64) -> u64 {
    (16 - position % 16) % 16
}

/// Skip to the next 16-byte boundary relative to `origin`
///
/// No bytes are skipped when already aligned. Returns the padding consumed.
pub fn align16<R: Seek>(reader: &mut R, origin: u64) -> std::io::Result<u64> {
    let position = reader.stream_position()?;
    let padding = padding_for(position.saturating_sub(origin));
    if padding > 0 {
        reader.seek(SeekFrom::Current(padding as i64))?;
    }
    Ok(padding)
}

/// Read a classic bundle starting at the reader's position
pub fn read_classic_bundle<R: Read + Seek>(reader: &mut R, path: &str) -> BundleResult<Bundle> {
    let origin = reader.stream_position()?;
    let manifest = ClassicManifest::read(reader)?;
    parse_classic(path, &manifest, reader, origin)
}

/// Read the record stream that follows `manifest`
///
/// `origin` is the absolute offset of the bundle start; alignment is
/// computed relative to it. Ebx records come first, then resources, then
/// chunks, each preceded by 16-byte alignment. The reader is left aligned
/// after the last record.
pub fn parse_classic<R: Read + Seek>(
    path: &str,
    manifest: &ClassicManifest,
    reader: &mut R,
    origin: u64,
) -> BundleResult<Bundle> {
    let header = &manifest.header;
    if header.is_dbx_mode() {
        return Err(BundleError::DbxMode);
    }

    let ebx_count = header.ebx_count as usize;
    let res_count = header.res_count as usize;

    let mut bundle = Bundle::new(path);
    bundle.align_members = true;

    for (record, sha1) in manifest
        .records
        .iter()
        .zip(&manifest.sha1s)
        .take(ebx_count)
    {
        align16(reader, origin)?;
        let payload = read_payload(reader, u64::from(record.payload_size), "ebx record")?;
        bundle.ebx.push(EbxEntry {
            name: manifest.name(record)?,
            sha1: *sha1,
            size: u64::from(record.payload_size),
            original_size: u64::from(record.payload_size),
            payload: Some(payload),
        });
    }

    let res_tables = manifest
        .res_types
        .iter()
        .zip(&manifest.res_meta)
        .zip(&manifest.res_rids);
    for ((record, sha1), ((res_type, res_meta), res_rid)) in manifest
        .records
        .iter()
        .zip(&manifest.sha1s)
        .skip(ebx_count)
        .take(res_count)
        .zip(res_tables)
    {
        align16(reader, origin)?;
        let payload = read_payload(reader, u64::from(record.payload_size), "resource record")?;
        bundle.res.push(ResourceEntry {
            name: manifest.name(record)?,
            sha1: *sha1,
            size: u64::from(record.payload_size),
            original_size: u64::from(record.payload_size),
            res_type: *res_type,
            res_meta: res_meta.to_vec(),
            res_rid: *res_rid,
            payload: Some(payload),
        });
    }

    for (index, (chunk, sha1)) in manifest
        .chunks
        .iter()
        .zip(manifest.sha1s.iter().skip(ebx_count + res_count))
        .enumerate()
    {
        align16(reader, origin)?;
        let size = chunk.payload_size();
        let payload = read_payload(reader, u64::from(size), "chunk record")?;
        bundle.chunks.push(BundleChunk {
            id: chunk.id,
            sha1: *sha1,
            size: u64::from(size),
            logical_offset: chunk.range_start,
            logical_size: size,
            meta: manifest.chunk_meta.get(index).cloned(),
            payload: Some(payload),
        });
    }

    align16(reader, origin)?;
    bundle.total_size = reader.stream_position()? - origin;
    Ok(bundle)
}

fn read_payload<R: Read>(reader: &mut R, size: u64, section: &'static str) -> BundleResult<Bytes> {
    let mut buf = Vec::with_capacity(size.min(1 << 20) as usize);
    reader.by_ref().take(size).read_to_end(&mut buf)?;
    if buf.len() as u64 != size {
        return Err(BundleError::Truncated {
            section,
            expected: size,
            actual: buf.len() as u64,
        });
    }
    Ok(Bytes::from(buf))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bundle::{ClassicBundleBuilder, MAGIC_DBX_MODE};
    use crate::dbobject::DbObject;
    use crate::keys::Guid;
    use binrw::io::Cursor;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_padding_for() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(1), 15);
        assert_eq!(padding_for(15), 1);
        assert_eq!(padding_for(16), 0);
        assert_eq!(padding_for(33), 15);
    }

    #[test]
    fn test_parse_all_member_kinds() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("Levels/MP_Siege", b"ebx-payload".to_vec());
        builder.add_res("Textures/Sky", 0x5C4954A6, [7; 16], 42, vec![1, 2, 3]);
        builder.add_chunk(
            Guid::from_bytes([3; 16]),
            vec![9; 40],
            Some(DbObject::new().with("h32", 5i32)),
        );
        let data = builder.build().expect("build");

        let bundle =
            read_classic_bundle(&mut Cursor::new(data.clone()), "win32/levels/mp_siege")
                .expect("parse");
        assert_eq!(bundle.path, "win32/levels/mp_siege");
        assert_eq!(bundle.ebx.len(), 1);
        assert_eq!(bundle.ebx[0].name, "Levels/MP_Siege");
        assert_eq!(bundle.ebx[0].payload.as_deref(), Some(&b"ebx-payload"[..]));
        assert_eq!(bundle.res[0].name, "Textures/Sky");
        assert_eq!(bundle.res[0].res_type, 0x5C4954A6);
        assert_eq!(bundle.res[0].res_meta, vec![7; 16]);
        assert_eq!(bundle.res[0].res_rid, 42);
        assert_eq!(bundle.chunks[0].id, Guid::from_bytes([3; 16]));
        assert_eq!(bundle.chunks[0].size, 40);
        assert_eq!(
            bundle.chunks[0].meta.as_ref().and_then(|m| m.get_int("h32")),
            Some(5)
        );
        assert_eq!(bundle.total_size, data.len() as u64);
    }

    #[test]
    fn test_parse_at_unaligned_file_offset() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("a", vec![1; 3]);
        builder.add_ebx("b", vec![2; 17]);
        let body = builder.build().expect("build");

        let mut file = vec![0xEE; 7];
        file.extend_from_slice(&body);
        let mut cursor = Cursor::new(file);
        cursor.set_position(7);

        let bundle = read_classic_bundle(&mut cursor, "b").expect("parse");
        assert_eq!(bundle.ebx[1].payload.as_deref(), Some(&[2u8; 17][..]));
        assert_eq!((cursor.position() - 7) % 16, 0);
    }

    #[test]
    fn test_dbx_mode_fails_fast() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("ignored", vec![0; 4]);
        builder.set_magic(MAGIC_DBX_MODE);
        let data = builder.build().expect("build");

        assert!(matches!(
            read_classic_bundle(&mut Cursor::new(data), "legacy"),
            Err(BundleError::DbxMode)
        ));
    }

    #[test]
    fn test_truncated_record_stream() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("a", vec![1; 64]);
        let mut data = builder.build().expect("build");
        data.truncate(data.len() - 40);

        assert!(matches!(
            read_classic_bundle(&mut Cursor::new(data), "a"),
            Err(BundleError::Truncated { section: "ebx record", .. })
        ));
    }

    #[test]
    fn test_manifest_tables_past_manifest_size() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("a", vec![1; 4]);
        let mut data = builder.build().expect("build");
        // Claim ten more ebx records than the manifest can hold
        data[4 + 4..4 + 8].copy_from_slice(&11u32.to_be_bytes());
        data[4 + 8..4 + 12].copy_from_slice(&11u32.to_be_bytes());

        assert!(matches!(
            read_classic_bundle(&mut Cursor::new(data), "a"),
            Err(BundleError::SectionOutOfBounds { section: "tables", .. })
        ));
    }

    #[test]
    fn test_chunk_meta_inside_header_rejected() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("a", vec![1; 4]);
        let mut data = builder.build().expect("build");
        // chunk_meta_offset = 0, chunk_meta_size = 1
        data[28..32].copy_from_slice(&0u32.to_be_bytes());
        data[32..36].copy_from_slice(&1u32.to_be_bytes());

        assert!(matches!(
            read_classic_bundle(&mut Cursor::new(data), "a"),
            Err(BundleError::SectionOutOfBounds { section: "chunk meta", .. })
        ));
    }

    #[test]
    fn test_chunk_meta_overlapping_tables_rejected() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("a", vec![1; 4]);
        let mut data = builder.build().expect("build");
        // Points at the SHA-1 table right after the header
        data[28..32].copy_from_slice(&40u32.to_be_bytes());
        data[32..36].copy_from_slice(&4u32.to_be_bytes());

        assert!(matches!(
            read_classic_bundle(&mut Cursor::new(data), "a"),
            Err(BundleError::SectionOutOfBounds { section: "chunk meta", .. })
        ));
    }

    #[test]
    fn test_oversized_manifest_size_reports_truncation() {
        let mut builder = ClassicBundleBuilder::new();
        builder.add_ebx("a", vec![1; 4]);
        let mut data = builder.build().expect("build");
        // Text block runs to the end of the claimed manifest
        data[0..4].copy_from_slice(&u32::MAX.to_be_bytes());

        assert!(matches!(
            read_classic_bundle(&mut Cursor::new(data), "a"),
            Err(BundleError::Truncated { section: "manifest", .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_records_start_aligned(
            sizes in prop::collection::vec(0usize..70, 1..8),
            lead in 0usize..40,
        ) {
            let mut builder = ClassicBundleBuilder::new();
            for (i, size) in sizes.iter().enumerate() {
                builder.add_ebx(&format!("ebx/{i}"), vec![i as u8; *size]);
            }
            let body = builder.build().expect("build");

            let mut file = vec![0u8; lead];
            file.extend_from_slice(&body);
            let mut cursor = Cursor::new(file);
            cursor.set_position(lead as u64);

            let bundle = read_classic_bundle(&mut cursor, "p").expect("parse");
            prop_assert_eq!(bundle.ebx.len(), sizes.len());
            for (entry, size) in bundle.ebx.iter().zip(&sizes) {
                prop_assert_eq!(entry.payload.as_ref().map(Bytes::len), Some(*size));
            }
            prop_assert_eq!((cursor.position() - lead as u64) % 16, 0);
        }

        #[test]
        fn prop_align16_padding(position in 0u64..10_000, origin in 0u64..64) {
            let mut cursor = Cursor::new(Vec::<u8>::new());
            cursor.set_position(origin + position);
            let padding = align16(&mut cursor, origin).expect("seek");
            prop_assert_eq!(padding, (16 - position % 16) % 16);
            prop_assert_eq!((cursor.position() - origin) % 16, 0);
        }
    }
}
