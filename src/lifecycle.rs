//! Idempotent page teardown.
//!
//! Everything the runtime owns that outlives a single await (the
//! viewport observer, the report tasks, the scheduler, the loaded
//! modules) is surrendered to one [`Teardown`] hook. The embedder wires
//! `run` to its page-exit event; running it again later is a no-op, and
//! each module's cleanup fires exactly once no matter how many exit
//! events arrive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::loader::ModuleSet;
use crate::monitor::ReportTasks;
use crate::scheduler::LazyScheduler;
use crate::traits::ViewportObserver;

/// One-shot teardown hook for the page runtime.
pub struct Teardown {
    done: AtomicBool,
    modules: Arc<ModuleSet>,
    scheduler: Mutex<Option<Arc<LazyScheduler>>>,
    observer: Mutex<Option<Arc<dyn ViewportObserver>>>,
    tasks: Mutex<Option<ReportTasks>>,
}

impl Teardown {
    /// Creates a teardown hook over the loaded module set.
    pub fn new(modules: Arc<ModuleSet>) -> Self {
        Self {
            done: AtomicBool::new(false),
            modules,
            scheduler: Mutex::new(None),
            observer: Mutex::new(None),
            tasks: Mutex::new(None),
        }
    }

    /// Registers the scheduler to stop.
    pub fn set_scheduler(&self, scheduler: Arc<LazyScheduler>) {
        *self.scheduler.lock() = Some(scheduler);
    }

    /// Registers the viewport observer to disconnect.
    pub fn set_observer(&self, observer: Arc<dyn ViewportObserver>) {
        *self.observer.lock() = Some(observer);
    }

    /// Registers the report tasks to abort.
    pub fn set_report_tasks(&self, tasks: ReportTasks) {
        *self.tasks.lock() = Some(tasks);
    }

    /// True when report tasks were registered and not yet taken.
    pub fn has_report_tasks(&self) -> bool {
        self.tasks.lock().is_some()
    }

    /// Runs teardown. Only the first call does any work.
    ///
    /// Order matters: observation stops first so nothing new arrives,
    /// then timers, then module cleanup.
    pub fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            debug!("teardown already ran; ignoring");
            return;
        }
        info!("tearing down page runtime");

        if let Some(scheduler) = self.scheduler.lock().take() {
            scheduler.stop();
        }
        if let Some(observer) = self.observer.lock().take() {
            observer.disconnect();
        }
        if let Some(tasks) = self.tasks.lock().take() {
            tasks.abort();
        }

        for module in self.modules.all() {
            debug!(module = %module.name(), "cleaning up module");
            module.cleanup();
        }
    }

    /// True once `run` has executed.
    pub fn has_run(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("done", &self.has_run())
            .field("modules", &self.modules.len())
            .finish()
    }
}
