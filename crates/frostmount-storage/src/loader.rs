//! Transactional load driver
//!
//! [`GameLoader::load`] runs one full cycle: clear the previous state,
//! discover the layout, mount catalogs and superbundles and, if configured,
//! every bundle. The layout, the mounted superbundles and the
//! bundle registry are built privately and published in one swap, so no
//! caller ever sees a half-built registry.

use dashmap::DashMap;
use frostmount_formats::bundle::Bundle;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{info, warn};

use crate::bundle::{
    BundleMountDispatcher, BundleRegistry, DiscoveredBundle, MountReport, SuperbundleReaders,
};
use crate::config::{LoaderConfig, Strictness};
use crate::content::ContentManager;
use crate::events::{EventSink, MountEvent, NullSink};
use crate::layout::{GameLayout, LayoutNotice, LayoutResolver, SuperbundleEntry};
use crate::mount::MountSurface;
use crate::superbundle::{CompositeSuperbundle, SuperbundleManager};
use crate::vfs::GameFileSystem;
use crate::{MountError, Result};

/// Counters of one load cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Superbundles mounted under `/sb`
    pub superbundles: usize,
    /// Bundles discovered across mounted superbundles
    pub bundles_discovered: usize,
    /// Bundles mounted during the load
    pub bundles_mounted: usize,
    /// Distinct CAS catalog digests mounted
    pub catalog_entries: usize,
    /// Conditions found during discovery
    pub notices: Vec<LayoutNotice>,
}

/// Everything one load cycle built, published as a unit
struct LoadState {
    layout: Arc<GameLayout>,
    composites: DashMap<String, Arc<CompositeSuperbundle>>,
    bundles: BundleRegistry,
}

impl LoadState {
    fn new(layout: Arc<GameLayout>) -> Self {
        Self {
            layout,
            composites: DashMap::new(),
            bundles: BundleRegistry::new(),
        }
    }

    fn superbundle_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.composites.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }
}

/// Loads one game into a mount surface
///
/// Load cycles and mount passes are serialized; readers only ever see the
/// state of the last completed load.
pub struct GameLoader {
    config: LoaderConfig,
    fs: Arc<dyn GameFileSystem>,
    surface: Arc<dyn MountSurface>,
    events: Arc<dyn EventSink>,
    cycle: Mutex<()>,
    state: RwLock<Option<Arc<LoadState>>>,
}

impl GameLoader {
    /// Create a loader that publishes no events
    pub fn new(
        config: LoaderConfig,
        fs: Arc<dyn GameFileSystem>,
        surface: Arc<dyn MountSurface>,
    ) -> Self {
        Self {
            config,
            fs,
            surface,
            events: Arc::new(NullSink),
            cycle: Mutex::new(()),
            state: RwLock::new(None),
        }
    }

    /// Deliver events to `events`
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Loader configuration
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Run one full load cycle
    ///
    /// The previous snapshot and everything mounted from it is dropped
    /// first. The new layout, superbundles and bundle registry become
    /// visible together once the cycle succeeds. A failed load leaves no
    /// snapshot published.
    pub fn load(&self) -> Result<LoadSummary> {
        let _cycle = self.cycle.lock();
        self.reset();

        let layout = Arc::new(LayoutResolver::new(self.fs.as_ref(), &self.config).discover()?);
        for notice in &layout.notices {
            let LayoutNotice::StaleOverlay { package, head, base } = notice;
            warn!("Ignored stale patch data from package {package}");
            self.events.publish(MountEvent::StaleOverlayIgnored {
                package: package.clone(),
                head: *head,
                base: *base,
            });
        }
        self.events.publish(MountEvent::LayoutDiscovered {
            superbundles: layout.superbundles.len(),
            packages: layout.packages.len(),
            authoritative: layout.authoritative_package.clone(),
        });

        let state = LoadState::new(layout);
        let summary = match self.mount_layout(&state) {
            Ok(summary) => summary,
            Err(error) => {
                self.reset();
                return Err(error);
            }
        };
        *self.state.write() = Some(Arc::new(state));

        self.events.publish(MountEvent::LoadCompleted {
            superbundles: summary.superbundles,
            bundles: summary.bundles_mounted,
        });
        info!(
            "Load completed: {} superbundles, {} bundles mounted",
            summary.superbundles, summary.bundles_mounted
        );
        Ok(summary)
    }

    fn reset(&self) {
        *self.state.write() = None;
        self.surface.clear();
    }

    fn mount_layout(&self, state: &LoadState) -> Result<LoadSummary> {
        let layout = &state.layout;
        let catalog_entries =
            ContentManager::new(self.fs.as_ref(), self.surface.as_ref(), self.config.strictness)
                .mount_base_content(layout)?;

        let codec = self.config.engine.codec();
        let mounted = SuperbundleManager::new(
            self.fs.as_ref(),
            codec,
            self.surface.as_ref(),
            self.events.as_ref(),
            self.config.strictness,
        )
        .with_parallel(self.config.parallel_mount)
        .mount_superbundles(layout, &state.bundles)?;
        for composite in &mounted {
            state
                .composites
                .insert(composite.name.clone(), Arc::clone(composite));
        }

        let bundles_mounted = if self.config.mount_bundles_on_load {
            self.mount_matching(state, "")?
        } else {
            0
        };

        Ok(LoadSummary {
            superbundles: mounted.len(),
            bundles_discovered: state.bundles.len(),
            bundles_mounted,
            catalog_entries,
            notices: layout.notices.clone(),
        })
    }

    /// Published discovery snapshot
    pub fn layout(&self) -> Option<Arc<GameLayout>> {
        self.current().map(|state| Arc::clone(&state.layout))
    }

    /// Mounted superbundle by exact name
    pub fn composite(&self, name: &str) -> Option<Arc<CompositeSuperbundle>> {
        let state = self.current()?;
        state.composites.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Names of mounted superbundles, sorted
    pub fn superbundle_names(&self) -> Vec<String> {
        self.current()
            .map(|state| state.superbundle_names())
            .unwrap_or_default()
    }

    /// Every discovered bundle sorted by name
    pub fn discovered_bundles(&self) -> Vec<DiscoveredBundle> {
        self.current()
            .map(|state| state.bundles.discovered_bundles())
            .unwrap_or_default()
    }

    /// Mount the bundles of every superbundle whose name contains `filter`
    ///
    /// Matching ignores case; an empty filter matches everything. Returns the
    /// number of bundles mounted. A superbundle whose files cannot be read is
    /// skipped; other failures abort the pass only in strict mode.
    pub fn mount_superbundle_bundles(&self, filter: &str) -> Result<usize> {
        let _cycle = self.cycle.lock();
        let state = self.snapshot()?;
        self.mount_matching(&state, filter)
    }

    fn mount_matching(&self, state: &LoadState, filter: &str) -> Result<usize> {
        let filter = filter.to_lowercase();

        let mut total = 0;
        for name in state.superbundle_names() {
            if !name.to_lowercase().contains(&filter) {
                continue;
            }
            let Some(composite) = state.composites.get(&name).map(|c| Arc::clone(c.value()))
            else {
                continue;
            };
            let Some(entry) = state.layout.superbundle(&name) else {
                continue;
            };

            let report = match self.mount_composite(&composite, entry) {
                Ok(report) => report,
                Err(MountError::RecoverableLookup(reason)) => {
                    warn!("Skipping bundles of {name}: {reason}");
                    self.publish_skipped(&composite);
                    continue;
                }
                Err(error) if self.config.strictness == Strictness::Strict => return Err(error),
                Err(error) => {
                    warn!("Skipping bundles of {name}: {error}");
                    self.publish_skipped(&composite);
                    continue;
                }
            };

            for mounted in &report.bundles {
                state
                    .bundles
                    .mark_mounted(&mounted.key, Arc::clone(&mounted.bundle));
            }
            self.events.publish(MountEvent::SuperbundleBundlesMounted {
                name: composite.name.clone(),
                mounted: report.bundles.len(),
                failed: report.failures.len(),
            });
            total += report.bundles.len();
        }
        Ok(total)
    }

    fn mount_composite(
        &self,
        composite: &CompositeSuperbundle,
        entry: &SuperbundleEntry,
    ) -> Result<MountReport> {
        let mut readers =
            SuperbundleReaders::open(self.fs.as_ref(), entry, composite.is_patched())?;
        self.dispatcher().mount_all(composite, &mut readers)
    }

    fn publish_skipped(&self, composite: &CompositeSuperbundle) {
        self.events.publish(MountEvent::SuperbundleBundlesMounted {
            name: composite.name.clone(),
            mounted: 0,
            failed: composite.bundles.len(),
        });
    }

    /// Mount one discovered bundle by name
    pub fn mount_bundle(&self, name: &str) -> Result<Arc<Bundle>> {
        let _cycle = self.cycle.lock();
        let state = self.snapshot()?;
        let discovered = state
            .bundles
            .get(name)
            .ok_or_else(|| MountError::RecoverableLookup(format!("bundle {name} not discovered")))?;
        let composite = state
            .composites
            .get(&discovered.superbundle)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| {
                MountError::RecoverableLookup(format!(
                    "superbundle {} not mounted",
                    discovered.superbundle
                ))
            })?;
        let entry = state.layout.superbundle(&composite.name).ok_or_else(|| {
            MountError::RecoverableLookup(format!("superbundle {} not in layout", composite.name))
        })?;

        let mut readers =
            SuperbundleReaders::open(self.fs.as_ref(), entry, composite.is_patched())?;
        let bundle = self
            .dispatcher()
            .mount_one(&composite, &discovered.entry, &mut readers)?;
        state
            .bundles
            .mark_mounted(&discovered.entry.id, Arc::clone(&bundle));
        Ok(bundle)
    }

    /// Dismount one bundle; returns `false` if it was not mounted
    pub fn dismount_bundle(&self, name: &str) -> bool {
        let _cycle = self.cycle.lock();
        self.current()
            .is_some_and(|state| state.bundles.dismount_bundle(self.surface.as_ref(), name))
    }

    /// Dismount every mounted bundle
    pub fn dismount_bundles(&self) -> usize {
        let _cycle = self.cycle.lock();
        self.current()
            .map_or(0, |state| state.bundles.dismount_bundles(self.surface.as_ref()))
    }

    fn current(&self) -> Option<Arc<LoadState>> {
        self.state.read().clone()
    }

    fn snapshot(&self) -> Result<Arc<LoadState>> {
        self.current()
            .ok_or_else(|| MountError::RecoverableLookup("no game layout loaded".to_string()))
    }

    fn dispatcher(&self) -> BundleMountDispatcher<'_> {
        BundleMountDispatcher::new(
            self.config.engine.codec(),
            self.surface.as_ref(),
            self.config.strictness,
        )
    }
}
