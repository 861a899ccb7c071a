#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! End-to-end discovery, merge and mount scenarios over in-memory games

mod common;

use common::{DATA, PATCH_DATA, SuperbundleFiles, memory_fs, write_layout, write_package};
use frostmount_formats::bundle::{ClassicBundleBuilder, MAGIC_DBX_MODE};
use frostmount_formats::keys::Guid;
use frostmount_storage::bundle::{MountStrategy, select};
use frostmount_storage::vfs::MemoryFileSystem;
use frostmount_storage::mount::MountedEntity;
use frostmount_storage::{
    GameLoader, LayoutNotice, LoaderConfig, MountError, MountEvent, MountRegistry, Namespace,
    RecordingSink, Strictness,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::{Arc, OnceLock, Weak};

fn loader(
    fs: Arc<MemoryFileSystem>,
    config: LoaderConfig,
) -> (GameLoader, Arc<MountRegistry>, Arc<RecordingSink>) {
    let surface = Arc::new(MountRegistry::new());
    let events = Arc::new(RecordingSink::new());
    let loader = GameLoader::new(config, fs, surface.clone()).with_events(events.clone());
    (loader, surface, events)
}

fn base_game() -> Arc<MemoryFileSystem> {
    let fs = memory_fs();
    write_layout(&fs, DATA, Some(7), None, &["win32/globals"]);
    SuperbundleFiles::classic()
        .pad_to(1024)
        .classic_bundle("chunks/01", &["base/asset"])
        .chunk(1)
        .write(&fs, &format!("{DATA}/win32/globals"));
    fs
}

fn patch_game(base_stamp: i64) -> Arc<MemoryFileSystem> {
    let fs = base_game();
    write_package(&fs, "Patch", true);
    write_layout(&fs, PATCH_DATA, Some(8), Some(base_stamp), &["win32/globals"]);
    SuperbundleFiles::classic()
        .classic_bundle("chunks/01", &["patch/asset"])
        .chunk(1)
        .chunk(2)
        .write(&fs, &format!("{PATCH_DATA}/win32/globals"));
    fs
}

#[test]
fn scenario_a_base_only() {
    let (loader, surface, events) = loader(base_game(), LoaderConfig::default());
    let summary = loader.load().expect("load");

    assert_eq!(summary.superbundles, 1);
    assert_eq!(summary.bundles_discovered, 1);
    let layout = loader.layout().expect("snapshot");
    assert_eq!(layout.superbundles.len(), 1);
    assert_eq!(layout.superbundles[0].base_path, "/game/Data/win32/globals");
    assert!(!layout.superbundles[0].is_patched());

    let composite = surface.superbundle("win32/globals").expect("mounted");
    assert!(!composite.is_patched());
    assert_eq!(
        events.events().first(),
        Some(&MountEvent::LayoutDiscovered {
            superbundles: 1,
            packages: 0,
            authoritative: None,
        })
    );
}

#[test]
fn scenario_b_matching_patch_is_retained() {
    let (loader, surface, _) = loader(patch_game(7), LoaderConfig::default());
    let summary = loader.load().expect("load");

    assert!(summary.notices.is_empty());
    let layout = loader.layout().expect("snapshot");
    assert_eq!(layout.authoritative_package.as_deref(), Some("Patch"));
    assert!(layout.superbundles[0].is_patched());

    let composite = surface.superbundle("win32/globals").expect("mounted");
    assert!(composite.is_patched());
    assert_eq!(composite.chunks.len(), 2);
}

#[test]
fn scenario_b_stale_patch_matches_scenario_a() {
    let (stale_loader, _, events) = loader(patch_game(6), LoaderConfig::default());
    let summary = stale_loader.load().expect("load");
    let (base_loader, _, _) = loader(base_game(), LoaderConfig::default());
    base_loader.load().expect("load");

    assert_eq!(
        summary.notices,
        vec![LayoutNotice::StaleOverlay {
            package: "Patch".into(),
            head: Some(7),
            base: Some(6),
        }]
    );
    assert!(events.events().contains(&MountEvent::StaleOverlayIgnored {
        package: "Patch".into(),
        head: Some(7),
        base: Some(6),
    }));

    let stale = stale_loader.layout().expect("snapshot");
    let base = base_loader.layout().expect("snapshot");
    assert_eq!(stale.superbundles, base.superbundles);
    assert_eq!(stale.packages, base.packages);
    assert_eq!(stale.layout, base.layout);
    assert!(stale.authoritative_package.is_none());
}

#[test]
fn scenario_c_full_patch_reads_patch_file() {
    let (loader, surface, events) = loader(
        patch_game(7),
        LoaderConfig::default().with_mount_bundles_on_load(true),
    );
    let summary = loader.load().expect("load");
    assert_eq!(summary.bundles_mounted, 1);

    let composite = loader.composite("win32/globals").expect("composite");
    let entry = composite.bundle("chunks/01").expect("entry");
    assert_eq!(entry.offset, 1024);
    assert_eq!(
        select(&composite, &entry),
        MountStrategy::PatchedFull
    );

    assert!(surface.contains(Namespace::Ebx, "patch/asset"));
    assert!(!surface.contains(Namespace::Ebx, "base/asset"));
    assert!(events.events().contains(&MountEvent::SuperbundleBundlesMounted {
        name: "win32/globals".into(),
        mounted: 1,
        failed: 0,
    }));
    assert!(loader.discovered_bundles()[0].is_mounted());
}

#[test]
fn scenario_d_content_addressed_drops_base_only_bundles() {
    let fs = memory_fs();
    write_layout(&fs, DATA, Some(3), None, &["win32/ui"]);
    SuperbundleFiles::content_addressed()
        .cas_bundle("ui/base_only", &["ui/old"])
        .cas_bundle("ui/shared", &["ui/hud"])
        .write(&fs, &format!("{DATA}/win32/ui"));
    write_package(&fs, "Patch", true);
    write_layout(&fs, PATCH_DATA, Some(4), Some(3), &["win32/ui"]);
    SuperbundleFiles::content_addressed()
        .cas_bundle("ui/shared", &["ui/hud", "ui/minimap"])
        .write(&fs, &format!("{PATCH_DATA}/win32/ui"));

    let (loader, surface, _) = loader(fs, LoaderConfig::default().with_mount_bundles_on_load(true));
    loader.load().expect("load");

    let composite = loader.composite("win32/ui").expect("composite");
    assert!(composite.bundle("ui/base_only").is_none());
    let shared = composite.bundle("ui/shared").expect("shared");
    assert_eq!(
        select(&composite, &shared),
        MountStrategy::PatchedContentAddressed
    );

    let bundle = surface.bundle("ui/shared").expect("mounted bundle");
    assert_eq!(bundle.ebx.len(), 2);
    assert!(!surface.contains(Namespace::Ebx, "ui/old"));
}

#[test]
fn patch_added_bundle_reads_patch_file() {
    let fs = base_game();
    write_package(&fs, "Patch", true);
    write_layout(&fs, PATCH_DATA, Some(8), Some(7), &["win32/globals"]);
    SuperbundleFiles::classic()
        .classic_bundle("levels/new_map", &["levels/new_map/terrain"])
        .classic_record("chunks/01", &[], |r| r.with_base(true))
        .write(&fs, &format!("{PATCH_DATA}/win32/globals"));

    let (loader, surface, _) = loader(fs, LoaderConfig::default());
    loader.load().expect("load");
    assert_eq!(loader.mount_superbundle_bundles("GLOBALS").expect("mount"), 2);

    assert!(surface.contains(Namespace::Ebx, "levels/new_map/terrain"));
    assert!(surface.contains(Namespace::Ebx, "base/asset"));
}

#[test]
fn incremental_patch_merges_members() {
    let fs = base_game();
    write_package(&fs, "Patch", true);
    write_layout(&fs, PATCH_DATA, Some(8), Some(7), &["win32/globals"]);
    SuperbundleFiles::classic()
        .classic_record("chunks/01", &["patch/asset"], |r| r.with_delta(true))
        .write(&fs, &format!("{PATCH_DATA}/win32/globals"));

    let (loader, surface, _) = loader(fs, LoaderConfig::default());
    loader.load().expect("load");
    let bundle = loader.mount_bundle("CHUNKS/01").expect("mount bundle");

    let names: Vec<_> = bundle.ebx.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["base/asset", "patch/asset"]);
    assert!(surface.contains(Namespace::Ebx, "base/asset"));

    assert!(loader.dismount_bundle("chunks/01"));
    assert!(!surface.contains(Namespace::Ebx, "patch/asset"));
    assert_eq!(loader.dismount_bundles(), 0);
}

#[test]
fn dbx_bundle_fails_fast_in_strict_mode() {
    let fs = memory_fs();
    write_layout(&fs, DATA, Some(1), None, &["win32/legacy"]);
    let mut dbx = ClassicBundleBuilder::new();
    dbx.set_magic(MAGIC_DBX_MODE);
    SuperbundleFiles::classic()
        .raw_bundle("legacy/bundle", &dbx.build().expect("build"))
        .write(&fs, &format!("{DATA}/win32/legacy"));

    let (strict, _, _) = loader(
        fs.clone(),
        LoaderConfig::default().with_mount_bundles_on_load(true),
    );
    assert!(matches!(strict.load(), Err(MountError::UnsupportedFormat { .. })));
    assert!(strict.layout().is_none());

    let (lenient, _, events) = loader(
        fs,
        LoaderConfig::default()
            .with_strictness(Strictness::Lenient)
            .with_mount_bundles_on_load(true),
    );
    let summary = lenient.load().expect("lenient load");
    assert_eq!(summary.bundles_mounted, 0);
    assert!(events.events().contains(&MountEvent::SuperbundleBundlesMounted {
        name: "win32/legacy".into(),
        mounted: 0,
        failed: 1,
    }));
}

#[test]
fn reload_replaces_previous_state() {
    let fs = patch_game(7);
    let (loader, surface, _) = loader(fs.clone(), LoaderConfig::default());
    loader.load().expect("first load");
    assert!(loader.layout().expect("snapshot").authoritative_package.is_some());

    fs.remove("/game/Update/Patch/package.mft");
    loader.load().expect("second load");
    assert!(loader.layout().expect("snapshot").authoritative_package.is_none());
    assert!(!surface.superbundle("win32/globals").expect("mounted").is_patched());
    let chunk_key = |seed: u8| Guid::from_bytes([seed; 16]).to_string();
    assert!(surface.get(Namespace::Chunks, &chunk_key(2)).is_none());
    assert!(matches!(
        surface.get(Namespace::Chunks, &chunk_key(1)),
        Some(MountedEntity::SuperbundleChunk { .. })
    ));
}

#[test]
fn missing_data_directory_is_fatal() {
    let (loader, _, _) = loader(memory_fs(), LoaderConfig::default());
    assert!(matches!(loader.load(), Err(MountError::FatalConfiguration(_))));
}

#[test]
fn parallel_mount_matches_sequential() {
    let build = || {
        let fs = memory_fs();
        let names: Vec<String> = (0..8).map(|i| format!("win32/level_{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        write_layout(&fs, DATA, Some(1), None, &refs);
        for (i, name) in names.iter().enumerate() {
            SuperbundleFiles::classic()
                .classic_bundle(&format!("{name}/bundle"), &[&format!("{name}/ebx")])
                .chunk(i as u8)
                .write(&fs, &format!("{DATA}/{name}"));
        }
        fs
    };

    let (sequential, sequential_surface, _) =
        loader(build(), LoaderConfig::default().with_mount_bundles_on_load(true));
    let (parallel, parallel_surface, _) = loader(
        build(),
        LoaderConfig::default()
            .with_parallel_mount(true)
            .with_mount_bundles_on_load(true),
    );

    assert_eq!(
        sequential.load().expect("sequential"),
        parallel.load().expect("parallel")
    );
    for namespace in Namespace::ALL {
        assert_eq!(
            sequential_surface.keys(namespace),
            parallel_surface.keys(namespace)
        );
    }
}

fn two_superbundle_game() -> Arc<MemoryFileSystem> {
    let fs = memory_fs();
    write_layout(&fs, DATA, Some(1), None, &["win32/a", "win32/b"]);
    for name in ["win32/a", "win32/b"] {
        SuperbundleFiles::classic()
            .classic_bundle(&format!("{name}/bundle"), &[&format!("{name}/ebx")])
            .write(&fs, &format!("{DATA}/{name}"));
    }
    fs
}

#[test]
fn unreadable_superbundle_does_not_stop_bundle_mounting() {
    for strictness in [Strictness::Lenient, Strictness::Strict] {
        let fs = two_superbundle_game();
        let (loader, surface, events) =
            loader(fs.clone(), LoaderConfig::default().with_strictness(strictness));
        loader.load().expect("load");
        fs.remove("/game/Data/win32/a.sb");
        events.take();

        assert_eq!(loader.mount_superbundle_bundles("").expect("mount"), 1);
        assert!(surface.bundle("win32/b/bundle").is_some());
        assert!(surface.bundle("win32/a/bundle").is_none());
        assert_eq!(
            events.events(),
            vec![
                MountEvent::SuperbundleBundlesMounted {
                    name: "win32/a".into(),
                    mounted: 0,
                    failed: 1,
                },
                MountEvent::SuperbundleBundlesMounted {
                    name: "win32/b".into(),
                    mounted: 1,
                    failed: 0,
                },
            ]
        );
    }
}

#[test]
fn concurrent_loads_never_mix_cycles() {
    let fs = two_superbundle_game();
    let (loader, surface, _) =
        loader(fs, LoaderConfig::default().with_mount_bundles_on_load(true));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..5 {
                    loader.load().expect("load");
                }
            });
        }
    });

    assert_eq!(loader.superbundle_names(), vec!["win32/a", "win32/b"]);
    let discovered = loader.discovered_bundles();
    assert_eq!(discovered.len(), 2);
    assert!(discovered.iter().all(|bundle| bundle.is_mounted()));
    assert_eq!(surface.len(Namespace::Superbundles), 2);
    assert_eq!(surface.len(Namespace::Bundles), 2);
}

#[test]
fn snapshot_is_published_only_when_load_completes() {
    let handle: Arc<OnceLock<Weak<GameLoader>>> = Arc::new(OnceLock::new());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let handle = Arc::clone(&handle);
        let observed = Arc::clone(&observed);
        move |event: MountEvent| {
            if let Some(loader) = handle.get().and_then(Weak::upgrade) {
                let visible = loader.layout().is_some();
                let names = loader.superbundle_names().len();
                observed.lock().push((event, visible, names));
            }
        }
    };
    let loader = Arc::new(
        GameLoader::new(
            LoaderConfig::default().with_mount_bundles_on_load(true),
            two_superbundle_game(),
            Arc::new(MountRegistry::new()),
        )
        .with_events(Arc::new(sink)),
    );
    handle.set(Arc::downgrade(&loader)).expect("handle set once");

    for _ in 0..2 {
        loader.load().expect("load");
        let observed = std::mem::take(&mut *observed.lock());
        let (last, rest) = observed.split_last().expect("events");
        assert!(matches!(last, (MountEvent::LoadCompleted { .. }, true, 2)));
        assert!(!rest.is_empty());
        assert!(rest.iter().all(|(_, visible, names)| !visible && *names == 0));
    }
}
