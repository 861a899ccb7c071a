//! In-memory game directories for integration tests

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use frostmount_formats::bundle::{Bundle, ClassicBundleBuilder, EbxEntry, cas_body_object};
use frostmount_formats::dbobject::DbValue;
use frostmount_formats::header::{HeaderKind, wrap_document_body};
use frostmount_formats::keys::{Guid, Sha1};
use frostmount_formats::layout::{LayoutFile, LayoutSuperbundle};
use frostmount_formats::package::PackageManifest;
use frostmount_formats::toc::{TocBundle, TocChunk, TocFile};
use frostmount_storage::vfs::MemoryFileSystem;
use std::sync::Arc;

pub const DATA: &str = "/game/Data";
pub const PATCH_DATA: &str = "/game/Update/Patch/Data";

pub fn memory_fs() -> Arc<MemoryFileSystem> {
    Arc::new(MemoryFileSystem::new())
}

pub fn write_layout(
    fs: &MemoryFileSystem,
    data_dir: &str,
    head: Option<i64>,
    base: Option<i64>,
    superbundles: &[&str],
) {
    let layout = LayoutFile {
        head,
        base,
        superbundles: superbundles
            .iter()
            .map(|name| LayoutSuperbundle {
                name: (*name).to_string(),
            })
            .collect(),
        filesystems: Vec::new(),
    };
    let body = DbValue::Object(layout.to_object()).build();
    fs.insert(
        &format!("{data_dir}/layout.toc"),
        wrap_document_body(HeaderKind::Obfuscated, &body).expect("wrap layout"),
    );
}

pub fn write_package(fs: &MemoryFileSystem, dir_name: &str, authoritative: bool) {
    let manifest = PackageManifest {
        name: dir_name.to_string(),
        authoritative,
        path: None,
    };
    fs.insert(
        &format!("/game/Update/{dir_name}/package.mft"),
        DbValue::Object(manifest.to_object()).build(),
    );
}

/// Builds one `.toc`/`.sb` pair
pub struct SuperbundleFiles {
    content_addressed: bool,
    data: Vec<u8>,
    bundles: Vec<TocBundle>,
    chunks: Vec<TocChunk>,
}

impl SuperbundleFiles {
    pub fn classic() -> Self {
        Self {
            content_addressed: false,
            data: Vec::new(),
            bundles: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn content_addressed() -> Self {
        Self {
            content_addressed: true,
            ..Self::classic()
        }
    }

    /// Move the next body to `offset`
    pub fn pad_to(mut self, offset: usize) -> Self {
        self.data.resize(offset, 0);
        self
    }

    fn append(&mut self, body: &[u8]) -> (u64, u64) {
        while self.data.len() % 16 != 0 {
            self.data.push(0);
        }
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(body);
        (offset, body.len() as u64)
    }

    pub fn classic_bundle(self, id: &str, ebx: &[&str]) -> Self {
        self.classic_record(id, ebx, |record| record)
    }

    pub fn classic_record(
        mut self,
        id: &str,
        ebx: &[&str],
        flags: impl FnOnce(TocBundle) -> TocBundle,
    ) -> Self {
        let mut builder = ClassicBundleBuilder::new();
        for name in ebx {
            builder.add_ebx(name, name.as_bytes().to_vec());
        }
        let body = builder.build().expect("build bundle");
        let (offset, size) = self.append(&body);
        self.bundles.push(flags(TocBundle::new(id, offset, size)));
        self
    }

    /// Store an already encoded bundle body
    pub fn raw_bundle(mut self, id: &str, body: &[u8]) -> Self {
        let (offset, size) = self.append(body);
        self.bundles.push(TocBundle::new(id, offset, size));
        self
    }

    pub fn cas_bundle(mut self, id: &str, ebx: &[&str]) -> Self {
        let mut bundle = Bundle::new(id);
        bundle.total_size = 1024;
        for (i, name) in ebx.iter().enumerate() {
            bundle.ebx.push(EbxEntry {
                name: (*name).to_string(),
                sha1: Sha1::from_bytes([i as u8 + 1; 20]),
                size: 32,
                original_size: 64,
                payload: None,
            });
        }
        let body = DbValue::Object(cas_body_object(&bundle)).build();
        let (offset, size) = self.append(&body);
        self.bundles.push(TocBundle::new(id, offset, size));
        self
    }

    pub fn chunk(mut self, seed: u8) -> Self {
        let (offset, size) = self.append(&[seed; 32]);
        self.chunks.push(TocChunk {
            id: Guid::from_bytes([seed; 16]),
            offset,
            size,
        });
        self
    }

    pub fn write(self, fs: &MemoryFileSystem, path: &str) {
        let toc = TocFile {
            name: None,
            content_addressed: self.content_addressed,
            bundles: self.bundles,
            chunks: self.chunks,
        };
        let body = DbValue::Object(toc.to_object()).build();
        fs.insert(
            &format!("{path}.toc"),
            wrap_document_body(HeaderKind::Signed, &body).expect("wrap toc"),
        );
        fs.insert(&format!("{path}.sb"), self.data);
    }
}
