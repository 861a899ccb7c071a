//! Load cycle notifications

use parking_lot::Mutex;

/// Notable points of a load cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEvent {
    /// Discovery finished and the snapshot was published
    LayoutDiscovered {
        /// Superbundles with located files
        superbundles: usize,
        /// Update packages with readable manifests
        packages: usize,
        /// Retained authoritative package
        authoritative: Option<String>,
    },
    /// A patch layout was built for another base and was ignored
    StaleOverlayIgnored {
        /// Package whose layout was discarded
        package: String,
        /// Base layout `head` stamp
        head: Option<i64>,
        /// Patch layout `base` stamp
        base: Option<i64>,
    },
    /// A superbundle was merged and mounted under `/sb`
    SuperbundleMounted {
        /// Superbundle name
        name: String,
        /// Bundle descriptors in the composite
        bundles: usize,
        /// Chunk descriptors in the composite
        chunks: usize,
        /// Whether an authoritative layout was merged in
        patched: bool,
    },
    /// Bundles of one superbundle were mounted
    SuperbundleBundlesMounted {
        /// Superbundle name
        name: String,
        /// Bundles mounted
        mounted: usize,
        /// Bundles that failed
        failed: usize,
    },
    /// A load cycle finished
    LoadCompleted {
        /// Superbundles mounted
        superbundles: usize,
        /// Bundles mounted
        bundles: usize,
    },
}

/// Receiver of [`MountEvent`]s
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn publish(&self, event: MountEvent);
}

impl<F> EventSink for F
where
    F: Fn(MountEvent) + Send + Sync,
{
    fn publish(&self, event: MountEvent) {
        self(event);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: MountEvent) {}
}

/// Keeps every event in delivery order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MountEvent>>,
}

impl RecordingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<MountEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<MountEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: MountEvent) {
        self.events.lock().push(event);
    }
}
