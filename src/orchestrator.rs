//! Top-level façade wiring the runtime together.
//!
//! An [`Orchestrator`] owns one page's runtime: the loader, the ready
//! flag, the dispatcher, the scheduler, the monitor, and the teardown
//! hook, built and connected in one place so embedders only deal with
//! `start`, the two event entry points, and `shutdown`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};

use crate::config::{InitOptions, OrchestratorConfig, ViewportConfig};
use crate::dispatch::{DispatchOutcome, Dispatcher, InputEvent};
use crate::error::Result;
use crate::lifecycle::Teardown;
use crate::loader::{Loader, StatusSnapshot};
use crate::monitor::{self, PerfMonitor};
use crate::notice::{LogNoticePresenter, NoticePresenter};
use crate::ready::ReadyFlag;
use crate::registry::{ModuleCatalog, ModuleDescriptor};
use crate::scheduler::{LazyScheduler, ViewportEntry};
use crate::traits::{ModuleSource, ViewportObserver};

/// One page's runtime, fully wired.
pub struct Orchestrator {
    config: OrchestratorConfig,
    loader: Arc<Loader>,
    dispatcher: Arc<Dispatcher>,
    scheduler: Arc<LazyScheduler>,
    monitor: Arc<PerfMonitor>,
    ready: Arc<ReadyFlag>,
    teardown: Arc<Teardown>,
    observer: Option<Arc<dyn ViewportObserver>>,
    started: AtomicBool,
}

impl Orchestrator {
    /// Starts building an orchestrator over a module source.
    pub fn builder(source: Arc<dyn ModuleSource>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(source)
    }

    /// Runs the startup sequence; on success applies the page-level
    /// option overrides (viewport, batch size), connects the viewport
    /// observer and, with the debug flag on, starts performance
    /// reporting. Calling again is harmless: the sequence is memoized
    /// and the wiring happens once.
    #[instrument(skip(self, options))]
    pub async fn start(&self, options: InitOptions) -> bool {
        let viewport_override = options.viewport.clone();
        let batch_size_override = options.batch_size;
        let ok = Arc::clone(&self.loader).init(options).await;
        if !ok {
            return false;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return true;
        }

        if let Some(size) = batch_size_override {
            self.scheduler.set_batch_size(size);
        }
        if let Some(observer) = &self.observer {
            observer.connect(&self.effective_viewport(viewport_override));
            self.teardown.set_observer(Arc::clone(observer));
        }

        if self.config.debug {
            let loader = Arc::clone(&self.loader);
            let scheduler = Arc::clone(&self.scheduler);
            let tasks = monitor::spawn_reporting(
                Arc::clone(&self.monitor),
                self.config.report_delay,
                self.config.report_interval,
                move || json!({ "loader": loader.status(), "scheduler": scheduler.stats() }),
            );
            self.teardown.set_report_tasks(tasks);
        }

        info!("orchestrator started");
        true
    }

    /// The viewport settings `start` hands to the observer: the option
    /// override when it is usable, the built configuration otherwise.
    fn effective_viewport(&self, over: Option<ViewportConfig>) -> ViewportConfig {
        match over {
            Some(viewport) if !(0.0..=1.0).contains(&viewport.threshold) => {
                warn!(
                    threshold = viewport.threshold,
                    "viewport override threshold out of range; using configured settings"
                );
                self.config.viewport.clone()
            }
            Some(viewport) => viewport,
            None => self.config.viewport.clone(),
        }
    }

    /// Tears the runtime down. Idempotent.
    pub fn shutdown(&self) {
        self.teardown.run();
    }

    /// Registers or replaces catalog entries.
    pub fn register(&self, descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> Result<()> {
        self.loader.register(descriptors)
    }

    /// Routes one input event through the dispatcher.
    pub async fn dispatch(&self, event: InputEvent) -> DispatchOutcome {
        self.dispatcher.dispatch(event).await
    }

    /// Forwards a visibility report to the scheduler.
    pub async fn on_visibility(&self, entries: Vec<ViewportEntry>) {
        self.scheduler.on_visibility(entries).await;
    }

    /// Current loader status.
    pub fn status(&self) -> StatusSnapshot {
        self.loader.status()
    }

    /// True once the ready signal has been published.
    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// The loader.
    pub fn loader(&self) -> Arc<Loader> {
        Arc::clone(&self.loader)
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// The scheduler.
    pub fn scheduler(&self) -> Arc<LazyScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// The performance monitor.
    pub fn monitor(&self) -> Arc<PerfMonitor> {
        Arc::clone(&self.monitor)
    }

    /// The ready flag.
    pub fn ready(&self) -> Arc<ReadyFlag> {
        Arc::clone(&self.ready)
    }

    /// The teardown hook, for embedders that wire page exit directly.
    pub fn teardown(&self) -> Arc<Teardown> {
        Arc::clone(&self.teardown)
    }

    /// The effective configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// True while debug report tasks are registered.
    pub fn reporting_active(&self) -> bool {
        self.teardown.has_report_tasks()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("ready", &self.is_ready())
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("loader", &self.loader)
            .finish()
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    catalog: ModuleCatalog,
    source: Arc<dyn ModuleSource>,
    observer: Option<Arc<dyn ViewportObserver>>,
    presenter: Arc<dyn NoticePresenter>,
}

impl OrchestratorBuilder {
    fn new(source: Arc<dyn ModuleSource>) -> Self {
        Self {
            config: OrchestratorConfig::default(),
            catalog: ModuleCatalog::with_defaults(),
            source,
            observer: None,
            presenter: Arc::new(LogNoticePresenter),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the whole catalog (dropping the built-in modules).
    pub fn with_catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Adds or replaces one catalog entry.
    pub fn with_module(mut self, descriptor: ModuleDescriptor) -> Self {
        self.catalog.register(descriptor);
        self
    }

    /// Sets the viewport observer.
    pub fn with_observer(mut self, observer: Arc<dyn ViewportObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replaces the notice presenter.
    pub fn with_presenter(mut self, presenter: Arc<dyn NoticePresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Validates configuration and catalog, then wires the runtime.
    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;
        self.catalog.validate()?;

        let ready = Arc::new(ReadyFlag::new());
        let monitor = Arc::new(PerfMonitor::new());
        let loader = Arc::new(Loader::new(
            self.config.clone(),
            self.catalog,
            self.source,
            Arc::clone(&ready),
            Arc::clone(&monitor),
        ));
        let scheduler = Arc::new(LazyScheduler::new(
            self.config.batch_size,
            loader.module_set(),
            Arc::clone(&ready),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&loader),
            self.presenter,
            self.config.notice_ttl,
        ));
        let teardown = Arc::new(Teardown::new(loader.module_set()));
        teardown.set_scheduler(Arc::clone(&scheduler));

        Ok(Orchestrator {
            config: self.config,
            loader,
            dispatcher,
            scheduler,
            monitor,
            ready,
            teardown,
            observer: self.observer,
            started: AtomicBool::new(false),
        })
    }
}
