//! Dependency-ordered module loader.
//!
//! The loader owns the whole startup story: it walks the catalog in
//! priority order, refuses to fetch anything whose dependencies are not
//! active, pulls module units through the configured [`ModuleSource`],
//! runs init hooks in the canonical order, and publishes the one-shot
//! ready signal when every required module made it.
//!
//! # Architecture
//!
//! ```text
//!   init() ──► startup slot (Shared future, created once)
//!                  │
//!                  ▼
//!           run_startup()
//!             ├─ load phase    priority order, sequential,
//!             │                 per-module memoized fetch tasks
//!             ├─ init phase    canonical order, memoized init tasks
//!             └─ ready         ReadyFlag::set, exactly once
//!
//!   load_module() ──► same memoized fetch/init tasks, on demand
//! ```
//!
//! Every outcome is memoized for the loader's lifetime: the startup
//! sequence runs once no matter how many callers race `init()`, and a
//! module unit is fetched at most once, with concurrent demands joining
//! the in-flight attempt. A failed fetch or init stays failed; there is
//! no retry within one page.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{InitOptions, OrchestratorConfig};
use crate::error::{Error, Result};
use crate::monitor::PerfMonitor;
use crate::ready::{ReadyFlag, ReadySignal};
use crate::registry::{ModuleCatalog, ModuleDescriptor};
use crate::traits::{FeatureModule, ModuleSource};

mod set;
mod state;

pub use set::ModuleSet;
pub use state::{LoaderState, StatusSnapshot};

/// Memoized startup outcome shared by every `init` caller.
type SharedStartup = Shared<BoxFuture<'static, bool>>;

/// Memoized per-module load outcome; `None` records a failed fetch.
type SharedLoad = Shared<BoxFuture<'static, Option<Arc<dyn FeatureModule>>>>;

/// Memoized per-module init outcome.
type SharedInit = Shared<BoxFuture<'static, bool>>;

/// Fetches, initializes, and tracks feature modules.
pub struct Loader {
    config: RwLock<OrchestratorConfig>,
    catalog: RwLock<ModuleCatalog>,
    source: Arc<dyn ModuleSource>,
    modules: Arc<ModuleSet>,
    state: Arc<RwLock<LoaderState>>,
    ready: Arc<ReadyFlag>,
    monitor: Arc<PerfMonitor>,
    startup: Mutex<Option<SharedStartup>>,
    inflight: DashMap<String, SharedLoad>,
    init_tasks: DashMap<String, SharedInit>,
}

impl Loader {
    /// Creates a loader over a catalog and a module source.
    pub fn new(
        config: OrchestratorConfig,
        catalog: ModuleCatalog,
        source: Arc<dyn ModuleSource>,
        ready: Arc<ReadyFlag>,
        monitor: Arc<PerfMonitor>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            catalog: RwLock::new(catalog),
            source,
            modules: Arc::new(ModuleSet::new()),
            state: Arc::new(RwLock::new(LoaderState::new())),
            ready,
            monitor,
            startup: Mutex::new(None),
            inflight: DashMap::new(),
            init_tasks: DashMap::new(),
        }
    }

    /// Registers or replaces catalog entries, then validates the merged
    /// catalog. Registration after startup only affects future on-demand
    /// loads.
    pub fn register(&self, descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> Result<()> {
        let mut catalog = self.catalog.write();
        catalog.register_all(descriptors);
        catalog.validate()
    }

    /// Runs the startup sequence, or joins the one already created.
    ///
    /// Exactly one sequence ever runs per loader; every caller observes
    /// the same outcome, and `options` only take effect for the call that
    /// creates the sequence.
    ///
    /// Returns true when every required module loaded and initialized.
    /// Failures are logged here rather than surfaced, so the embedder
    /// keeps its server-rendered fallback on false.
    #[instrument(skip(self, options))]
    pub async fn init(self: Arc<Self>, options: InitOptions) -> bool {
        let task = {
            let mut slot = self.startup.lock();
            match slot.as_ref() {
                Some(task) => {
                    debug!("startup sequence already exists; joining it");
                    task.clone()
                }
                None => {
                    let loader = Arc::clone(&self);
                    let task: SharedStartup = async move { loader.run_startup(options).await }
                        .boxed()
                        .shared();
                    *slot = Some(task.clone());
                    task
                }
            }
        };
        task.await
    }

    /// Loads a single module on demand, outside the startup sequence.
    ///
    /// Returns the active handle, or `None` when the module is unknown,
    /// its dependencies are not loaded, or its fetch or init failed.
    /// Outcomes are memoized: nothing is ever fetched twice, and
    /// concurrent requests for the same module share one attempt. A
    /// module loaded this way runs its init hook before the handle is
    /// returned.
    #[instrument(skip(self))]
    pub async fn load_module(&self, name: &str) -> Option<Arc<dyn FeatureModule>> {
        if let Some(module) = self.modules.get(name) {
            if self.state.read().is_initialized(name) {
                return Some(module);
            }
            // Loaded but not initialized yet; join the memoized init.
            return if self.run_init(name, Arc::clone(&module)).await {
                Some(module)
            } else {
                None
            };
        }

        let Some(descriptor) = self.catalog.read().get(name).cloned() else {
            warn!(module = %name, "load requested for unregistered module");
            return None;
        };

        let missing = self.missing_dependencies(&descriptor);
        if !missing.is_empty() {
            let err = Error::dependency_unmet(name, missing);
            warn!(module = %name, %err, "on-demand load refused");
            self.state.write().record_failure(err);
            return None;
        }

        let source_base = self.config.read().source_base.clone();
        let module = self.fetch_module(&descriptor, &source_base).await?;
        if self.run_init(name, Arc::clone(&module)).await {
            Some(module)
        } else {
            None
        }
    }

    /// Current loader status.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::capture(&self.state.read(), self.ready.is_ready())
    }

    /// True once the ready signal has been published.
    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// Shared set of active module handles.
    pub fn module_set(&self) -> Arc<ModuleSet> {
        Arc::clone(&self.modules)
    }

    /// Shared ready flag.
    pub fn ready_flag(&self) -> Arc<ReadyFlag> {
        Arc::clone(&self.ready)
    }

    // ========================================================================
    // Startup sequence
    // ========================================================================

    async fn run_startup(self: Arc<Self>, options: InitOptions) -> bool {
        info!("module startup sequence starting");
        self.monitor.mark("modules:start");
        self.apply_options(&options);

        let order = self.catalog.read().load_order();
        let source_base = self.config.read().source_base.clone();

        let mut aborted = false;

        // Load phase: strictly sequential in priority order. A later
        // module's dependency check runs only after every earlier attempt
        // has settled.
        for descriptor in &order {
            if self.state.read().is_loaded(&descriptor.name) {
                continue;
            }

            let missing = self.missing_dependencies(descriptor);
            if !missing.is_empty() {
                // No fetch happens for a module with unmet dependencies.
                let err = Error::dependency_unmet(descriptor.name.clone(), missing);
                warn!(module = %descriptor.name, %err, "dependency check failed");
                self.state.write().record_failure(err);
                if descriptor.required {
                    aborted = true;
                    break;
                }
                continue;
            }

            let loaded = self.fetch_module(descriptor, &source_base).await.is_some();
            if !loaded && descriptor.required {
                error!(
                    module = %descriptor.name,
                    "required module failed to load; aborting startup"
                );
                aborted = true;
                break;
            }
        }

        self.monitor.mark("modules:loaded");
        self.monitor
            .measure_between("modules:load", "modules:start", "modules:loaded");

        if aborted {
            self.finish_failed();
            return false;
        }

        // Init phase: canonical order first, then the remaining loaded
        // modules in load order. Load priority plays no part here.
        let canonical = self.config.read().init_order.clone();
        let loaded_now = self.state.read().load_sequence().to_vec();
        let sequence = plan_init_sequence(&canonical, &loaded_now);

        for name in &sequence {
            let Some(module) = self.modules.get(name) else {
                continue;
            };
            if self.state.read().is_initialized(name) {
                continue;
            }
            if !self.run_init(name, module).await {
                let required = self
                    .catalog
                    .read()
                    .get(name)
                    .map(|d| d.required)
                    .unwrap_or(false);
                if required {
                    aborted = true;
                    break;
                }
            }
        }

        self.monitor.mark("modules:initialized");
        self.monitor
            .measure_between("modules:init", "modules:loaded", "modules:initialized");

        if aborted {
            self.finish_failed();
            return false;
        }

        // Ready is published only when every required module in this
        // sequence finished its init hook.
        let complete = {
            let state = self.state.read();
            order
                .iter()
                .filter(|d| d.required)
                .all(|d| state.is_initialized(&d.name))
        };
        if !complete {
            self.finish_failed();
            return false;
        }

        let signal = ReadySignal::new(self.state.read().load_sequence().to_vec());
        if self.ready.set(signal) {
            self.monitor.mark("modules:ready");
            self.monitor
                .measure_between("modules:total", "modules:start", "modules:ready");
            info!(
                modules = self.state.read().loaded_count(),
                "startup complete; page ready"
            );
        }
        true
    }

    fn apply_options(&self, options: &InitOptions) {
        if let Some(base) = &options.source_base {
            self.config.write().source_base = base.clone();
        }
        if !options.modules.is_empty() {
            let mut catalog = self.catalog.write();
            for (name, over) in &options.modules {
                if !catalog.apply_override(name, over) {
                    warn!(module = %name, "override for unregistered module ignored");
                }
            }
        }
    }

    fn finish_failed(&self) {
        self.monitor.mark("modules:failed");
        let state = self.state.read();
        let failed: Vec<&str> = state
            .failures()
            .iter()
            .filter_map(Error::module_name)
            .collect();
        error!(?failed, "startup aborted; page continues without dynamic modules");
    }

    // ========================================================================
    // Memoized per-module tasks
    // ========================================================================

    async fn fetch_module(
        &self,
        descriptor: &ModuleDescriptor,
        source_base: &str,
    ) -> Option<Arc<dyn FeatureModule>> {
        self.load_task(descriptor, source_base).await
    }

    /// Returns the memoized load future for a module, creating it on
    /// first use. Success and failure both stick for the loader lifetime.
    fn load_task(&self, descriptor: &ModuleDescriptor, source_base: &str) -> SharedLoad {
        self.inflight
            .entry(descriptor.name.clone())
            .or_insert_with(|| {
                let descriptor = descriptor.clone();
                let location = descriptor.resolved_source(source_base);
                let source = Arc::clone(&self.source);
                let modules = Arc::clone(&self.modules);
                let state = Arc::clone(&self.state);
                async move {
                    state.write().record_attempted(descriptor.name.clone());
                    debug!(module = %descriptor.name, %location, "fetching module unit");
                    match source.fetch(&descriptor, &location).await {
                        Ok(module) => {
                            modules.insert(Arc::clone(&module));
                            state.write().record_loaded(descriptor.name.clone());
                            info!(module = %descriptor.name, "module loaded");
                            Some(module)
                        }
                        Err(cause) => {
                            let err = Error::fetch_failed(
                                descriptor.name.clone(),
                                location.clone(),
                                &cause,
                            );
                            warn!(module = %descriptor.name, %err, "module fetch failed");
                            state.write().record_failure(err);
                            None
                        }
                    }
                }
                .boxed()
                .shared()
            })
            .clone()
    }

    async fn run_init(&self, name: &str, module: Arc<dyn FeatureModule>) -> bool {
        self.init_task(name, module).await
    }

    /// Returns the memoized init future for a module, creating it on
    /// first use. Promotion into the capability slots happens here, on
    /// success only.
    fn init_task(&self, name: &str, module: Arc<dyn FeatureModule>) -> SharedInit {
        self.init_tasks
            .entry(name.to_string())
            .or_insert_with(|| {
                let name = name.to_string();
                let modules = Arc::clone(&self.modules);
                let state = Arc::clone(&self.state);
                async move {
                    match module.init().await {
                        Ok(()) => {
                            state.write().record_initialized(name.clone());
                            modules.promote(&module);
                            debug!(module = %name, "module initialized");
                            true
                        }
                        Err(cause) => {
                            let err = Error::init_failed(name.clone(), &cause);
                            warn!(module = %name, %err, "module init failed");
                            state.write().record_failure(err);
                            false
                        }
                    }
                }
                .boxed()
                .shared()
            })
            .clone()
    }

    fn missing_dependencies(&self, descriptor: &ModuleDescriptor) -> Vec<String> {
        let state = self.state.read();
        let mut missing: Vec<String> = descriptor
            .depends_on
            .iter()
            .filter(|dep| !state.is_loaded(dep))
            .cloned()
            .collect();
        // Dependency sets are unordered; sort so messages are stable.
        missing.sort();
        missing
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("catalog", &self.catalog.read().names())
            .field("modules", &self.modules)
            .field("ready", &self.ready.is_ready())
            .finish()
    }
}

/// Canonical names that actually loaded, in canonical order, followed by
/// the remaining loaded modules in load order. Duplicates collapse to
/// their first appearance.
fn plan_init_sequence(canonical: &[String], loaded: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut sequence = Vec::with_capacity(loaded.len());
    for name in canonical {
        if loaded.iter().any(|l| l == name) && seen.insert(name.clone()) {
            sequence.push(name.clone());
        }
    }
    for name in loaded {
        if seen.insert(name.clone()) {
            sequence.push(name.clone());
        }
    }
    sequence
}
