//! Viewport-driven lazy-load batch scheduler.
//!
//! The embedder observes its content containers and forwards visibility
//! reports here. The scheduler claims the containers it has never seen,
//! sorts them nearest-first, chunks them into fixed-size batches, and
//! walks the batches strictly one after another through the data-store
//! capability. A container is claimed exactly once per page lifetime,
//! whether or not its batch later succeeds.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::loader::ModuleSet;
use crate::ready::ReadyFlag;

/// One container's visibility report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportEntry {
    /// Stable container id.
    pub container: String,

    /// Distance from the viewport in pixels: 0 inside, the absolute
    /// offset when above or below.
    pub distance: f64,
}

impl ViewportEntry {
    /// Creates an entry from a non-negative distance.
    pub fn new(container: impl Into<String>, distance: f64) -> Self {
        Self {
            container: container.into(),
            distance,
        }
    }

    /// Creates an entry from a signed viewport offset (negative above,
    /// positive below, zero inside). The sign is dropped; only magnitude
    /// matters for scheduling.
    pub fn from_offset(container: impl Into<String>, offset: f64) -> Self {
        Self::new(container, offset.abs())
    }
}

/// Counters exposed for the performance report.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Containers claimed into the processed set.
    pub containers_processed: u64,
    /// Batches dispatched (including failed ones).
    pub batches_dispatched: u64,
    /// Batches whose grouped fetch returned an error.
    pub batch_failures: u64,
}

/// Prioritized batch dispatcher for visible containers.
pub struct LazyScheduler {
    batch_size: AtomicUsize,
    modules: Arc<ModuleSet>,
    ready: Arc<ReadyFlag>,
    processed: Mutex<HashSet<String>>,
    dispatch_gate: tokio::sync::Mutex<()>,
    stopped: AtomicBool,
    containers_processed: AtomicU64,
    batches_dispatched: AtomicU64,
    batch_failures: AtomicU64,
}

impl LazyScheduler {
    /// Creates a scheduler. `batch_size` caps the containers per grouped
    /// fetch; values below 1 are treated as 1.
    pub fn new(batch_size: usize, modules: Arc<ModuleSet>, ready: Arc<ReadyFlag>) -> Self {
        Self {
            batch_size: AtomicUsize::new(batch_size.max(1)),
            modules,
            ready,
            processed: Mutex::new(HashSet::new()),
            dispatch_gate: tokio::sync::Mutex::new(()),
            stopped: AtomicBool::new(false),
            containers_processed: AtomicU64::new(0),
            batches_dispatched: AtomicU64::new(0),
            batch_failures: AtomicU64::new(0),
        }
    }

    /// Replaces the batch size cap for later reports. Values below 1 are
    /// treated as 1.
    pub fn set_batch_size(&self, batch_size: usize) {
        self.batch_size.store(batch_size.max(1), Ordering::Relaxed);
    }

    /// Current batch size cap.
    pub fn batch_size(&self) -> usize {
        self.batch_size.load(Ordering::Relaxed)
    }

    /// Handles one visibility report.
    ///
    /// Containers are claimed before any dispatch, so a concurrent report
    /// can never double-process one. Batches run strictly sequentially
    /// page-wide: the next batch starts only after the previous grouped
    /// fetch settled, even across overlapping reports. A failed batch is
    /// logged and counted; later batches still run, and its containers
    /// stay claimed.
    #[instrument(skip(self, entries), fields(reported = entries.len()))]
    pub async fn on_visibility(&self, entries: Vec<ViewportEntry>) {
        if self.stopped.load(Ordering::SeqCst) {
            debug!("scheduler stopped; dropping visibility report");
            return;
        }
        if !self.ready.is_ready() {
            debug!("page not ready; dropping visibility report");
            return;
        }

        let fresh = self.claim(entries);
        if fresh.is_empty() {
            trace!("no unprocessed containers in report");
            return;
        }

        let Some(datastore) = self.modules.datastore() else {
            warn!(
                dropped = fresh.len(),
                "datastore capability absent; dropping claimed containers"
            );
            return;
        };

        let batches = plan_batches(fresh, self.batch_size());
        let _gate = self.dispatch_gate.lock().await;
        for batch in batches {
            let ids: Vec<String> = batch.into_iter().map(|entry| entry.container).collect();
            debug!(size = ids.len(), "dispatching lazy-load batch");
            self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
            if let Err(cause) = datastore.fetch_batch(&ids).await {
                self.batch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    size = ids.len(),
                    error = %format!("{cause:#}"),
                    "lazy-load batch failed; containers stay claimed"
                );
            }
        }
    }

    /// True if this container has already been claimed.
    pub fn is_processed(&self, container: &str) -> bool {
        self.processed.lock().contains(container)
    }

    /// Number of containers claimed so far.
    pub fn processed_count(&self) -> usize {
        self.processed.lock().len()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            containers_processed: self.containers_processed.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
        }
    }

    /// Stops the scheduler; later reports are dropped. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// True once `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Moves unseen containers into the processed set and returns their
    /// entries. Duplicates inside one report collapse to the first.
    fn claim(&self, entries: Vec<ViewportEntry>) -> Vec<ViewportEntry> {
        let mut processed = self.processed.lock();
        let mut fresh = Vec::new();
        for entry in entries {
            if processed.insert(entry.container.clone()) {
                fresh.push(entry);
            }
        }
        drop(processed);
        self.containers_processed
            .fetch_add(fresh.len() as u64, Ordering::Relaxed);
        fresh
    }
}

impl std::fmt::Debug for LazyScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyScheduler")
            .field("batch_size", &self.batch_size())
            .field("processed", &self.processed_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Sorts entries nearest-first and splits them into batches of at most
/// `batch_size`.
///
/// The sort is stable, so entries at equal distance keep their report
/// order, and `total_cmp` keeps it total even for pathological floats.
pub fn plan_batches(mut entries: Vec<ViewportEntry>, batch_size: usize) -> Vec<Vec<ViewportEntry>> {
    entries.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    entries
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
