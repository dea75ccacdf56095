//! Shared test utilities and fixtures for the showrunner test suite.
//!
//! This module provides:
//! - Stub feature modules with configurable init behavior and counters
//! - Capability-bearing fakes (gallery, order, datastore, tracking)
//! - A scripted [`ModuleSource`] that records every fetch
//! - Recording implementations of the presenter and viewport observer
//! - Wiring helpers for building a [`Loader`] directly
//!
//! # Usage
//!
//! Include this module in your integration tests:
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use showrunner::config::{OrchestratorConfig, ViewportConfig};
use showrunner::loader::Loader;
use showrunner::monitor::PerfMonitor;
use showrunner::notice::{Notice, NoticePresenter};
use showrunner::ready::ReadyFlag;
use showrunner::registry::{ModuleCatalog, ModuleDescriptor};
use showrunner::traits::{
    DataStoreCapability, FeatureModule, GalleryCapability, ModuleSource, OrderCapability,
    TrackingCapability, ViewportObserver,
};

// ============================================================================
// Stub Feature Module
// ============================================================================

/// A configurable feature module for testing.
///
/// Tracks how many times its init and cleanup hooks ran, and can be
/// configured to fail or stall its init.
///
/// # Example
///
/// ```rust,ignore
/// let module = Arc::new(StubModule::new("cache"));
/// assert!(module.init().await.is_ok());
/// assert_eq!(module.init_count(), 1);
/// ```
#[derive(Debug)]
pub struct StubModule {
    name: String,
    init_error: Option<String>,
    init_delay: Option<Duration>,
    init_count: AtomicU32,
    cleanup_count: AtomicU32,
}

impl StubModule {
    /// Create a stub module with the given name. Init succeeds instantly.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init_error: None,
            init_delay: None,
            init_count: AtomicU32::new(0),
            cleanup_count: AtomicU32::new(0),
        }
    }

    /// Configure init to fail with the given message.
    pub fn with_init_failure(mut self, message: impl Into<String>) -> Self {
        self.init_error = Some(message.into());
        self
    }

    /// Configure init to sleep before settling.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    /// Number of times the init hook ran.
    pub fn init_count(&self) -> u32 {
        self.init_count.load(Ordering::SeqCst)
    }

    /// Number of times the cleanup hook ran.
    pub fn cleanup_count(&self) -> u32 {
        self.cleanup_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeatureModule for StubModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> anyhow::Result<()> {
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        self.init_count.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.init_error {
            anyhow::bail!("{message}");
        }
        Ok(())
    }

    fn cleanup(&self) {
        self.cleanup_count.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Capability Fakes
// ============================================================================

/// A gallery module that records every open and close.
#[derive(Debug)]
pub struct RecordingGallery {
    open_error: Option<String>,
    opened: RwLock<Vec<String>>,
    closes: AtomicU32,
}

impl RecordingGallery {
    pub fn new() -> Self {
        Self {
            open_error: None,
            opened: RwLock::new(Vec::new()),
            closes: AtomicU32::new(0),
        }
    }

    /// Configure every open to fail with the given message.
    pub fn with_open_failure(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Containers the gallery was opened for, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.read().clone()
    }

    /// Number of close calls.
    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

impl GalleryCapability for RecordingGallery {
    fn open(&self, container: &str) -> anyhow::Result<()> {
        self.opened.write().push(container.to_string());
        if let Some(message) = &self.open_error {
            anyhow::bail!("{message}");
        }
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FeatureModule for RecordingGallery {
    fn name(&self) -> &str {
        "gallery"
    }

    fn as_gallery(self: Arc<Self>) -> Option<Arc<dyn GalleryCapability>> {
        Some(self)
    }
}

/// An order module that records every opened order flow.
#[derive(Debug)]
pub struct RecordingOrder {
    open_error: Option<String>,
    opened: RwLock<Vec<String>>,
}

impl RecordingOrder {
    pub fn new() -> Self {
        Self {
            open_error: None,
            opened: RwLock::new(Vec::new()),
        }
    }

    /// Configure every open to fail with the given message.
    pub fn with_open_failure(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Containers the order flow was opened for, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.read().clone()
    }
}

impl OrderCapability for RecordingOrder {
    fn open_order(&self, container: &str) -> anyhow::Result<()> {
        self.opened.write().push(container.to_string());
        if let Some(message) = &self.open_error {
            anyhow::bail!("{message}");
        }
        Ok(())
    }
}

#[async_trait]
impl FeatureModule for RecordingOrder {
    fn name(&self) -> &str {
        "order"
    }

    fn as_order(self: Arc<Self>) -> Option<Arc<dyn OrderCapability>> {
        Some(self)
    }
}

/// A datastore module that records every batch it is asked to fetch.
///
/// The store also trips a flag if two `fetch_batch` calls ever overlap,
/// which the scheduler tests use to assert strictly sequential dispatch.
#[derive(Debug)]
pub struct RecordingDataStore {
    batch_delay: Option<Duration>,
    poisoned: RwLock<Vec<String>>,
    batches: RwLock<Vec<Vec<String>>>,
    active: AtomicU32,
    overlapped: AtomicBool,
}

impl RecordingDataStore {
    pub fn new() -> Self {
        Self {
            batch_delay: None,
            poisoned: RwLock::new(Vec::new()),
            batches: RwLock::new(Vec::new()),
            active: AtomicU32::new(0),
            overlapped: AtomicBool::new(false),
        }
    }

    /// Configure every batch fetch to sleep before settling. Combined
    /// with concurrent reports this widens any sequencing race.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    /// Any batch containing this container id fails (after recording).
    pub fn poison(&self, container: impl Into<String>) {
        self.poisoned.write().push(container.into());
    }

    /// Every batch received, in dispatch order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.read().clone()
    }

    /// Number of batches received.
    pub fn batch_count(&self) -> usize {
        self.batches.read().len()
    }

    /// All container ids across all batches, in dispatch order.
    pub fn dispatched(&self) -> Vec<String> {
        self.batches.read().iter().flatten().cloned().collect()
    }

    /// True if two batch fetches ever ran at the same time.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStoreCapability for RecordingDataStore {
    async fn fetch_batch(&self, containers: &[String]) -> anyhow::Result<()> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        if let Some(delay) = self.batch_delay {
            tokio::time::sleep(delay).await;
        }

        let batch = containers.to_vec();
        let failed = {
            let poisoned = self.poisoned.read();
            batch.iter().any(|id| poisoned.contains(id))
        };
        self.batches.write().push(batch);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if failed {
            anyhow::bail!("scripted batch failure");
        }
        Ok(())
    }
}

#[async_trait]
impl FeatureModule for RecordingDataStore {
    fn name(&self) -> &str {
        "datastore"
    }

    fn as_datastore(self: Arc<Self>) -> Option<Arc<dyn DataStoreCapability>> {
        Some(self)
    }
}

/// A tracking module that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    events: RwLock<Vec<(String, serde_json::Value)>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tracked event with its payload, in call order.
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.read().clone()
    }
}

impl TrackingCapability for RecordingTracker {
    fn track(&self, event: &str, payload: serde_json::Value) {
        self.events.write().push((event.to_string(), payload));
    }
}

#[async_trait]
impl FeatureModule for RecordingTracker {
    fn name(&self) -> &str {
        "tracking"
    }

    fn as_tracking(self: Arc<Self>) -> Option<Arc<dyn TrackingCapability>> {
        Some(self)
    }
}

// ============================================================================
// Scripted Module Source
// ============================================================================

enum SourceBehavior {
    Provide(Arc<dyn FeatureModule>),
    Fail(String),
}

/// A scripted [`ModuleSource`] for testing.
///
/// Unknown modules succeed with a plain [`StubModule`]; specific modules
/// can be scripted to return a prepared instance or to fail. Every fetch
/// is recorded, so tests can assert order, count, and resolved location.
///
/// # Example
///
/// ```rust,ignore
/// let source = ScriptedSource::new();
/// source.provide("gallery", Arc::new(RecordingGallery::new()));
/// source.fail("cache", "CDN returned 503");
///
/// // later
/// assert_eq!(source.fetch_count("gallery"), 1);
/// assert_eq!(source.fetch_log(), vec!["config", "gallery"]);
/// ```
pub struct ScriptedSource {
    behaviors: RwLock<HashMap<String, SourceBehavior>>,
    fetch_delay: RwLock<Option<Duration>>,
    fetch_log: RwLock<Vec<String>>,
    locations: RwLock<HashMap<String, String>>,
    fetch_counts: RwLock<HashMap<String, u32>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            behaviors: RwLock::new(HashMap::new()),
            fetch_delay: RwLock::new(None),
            fetch_log: RwLock::new(Vec::new()),
            locations: RwLock::new(HashMap::new()),
            fetch_counts: RwLock::new(HashMap::new()),
        }
    }

    /// Script a prepared module instance for the given name.
    pub fn provide(&self, name: impl Into<String>, module: Arc<dyn FeatureModule>) {
        self.behaviors
            .write()
            .insert(name.into(), SourceBehavior::Provide(module));
    }

    /// Script a fetch failure for the given name.
    pub fn fail(&self, name: impl Into<String>, message: impl Into<String>) {
        self.behaviors
            .write()
            .insert(name.into(), SourceBehavior::Fail(message.into()));
    }

    /// Make every fetch sleep before settling, so concurrent callers
    /// genuinely overlap the in-flight attempt.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.write() = Some(delay);
    }

    /// Names fetched so far, in call order. Memoized joins do not appear
    /// twice.
    pub fn fetch_log(&self) -> Vec<String> {
        self.fetch_log.read().clone()
    }

    /// Number of fetch calls for one module.
    pub fn fetch_count(&self, name: &str) -> u32 {
        self.fetch_counts.read().get(name).copied().unwrap_or(0)
    }

    /// The resolved location the last fetch for this module used.
    pub fn location_for(&self, name: &str) -> Option<String> {
        self.locations.read().get(name).cloned()
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleSource for ScriptedSource {
    async fn fetch(
        &self,
        descriptor: &ModuleDescriptor,
        location: &str,
    ) -> anyhow::Result<Arc<dyn FeatureModule>> {
        self.fetch_log.write().push(descriptor.name.clone());
        *self
            .fetch_counts
            .write()
            .entry(descriptor.name.clone())
            .or_insert(0) += 1;
        self.locations
            .write()
            .insert(descriptor.name.clone(), location.to_string());

        let delay = *self.fetch_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.behaviors.read().get(&descriptor.name) {
            Some(SourceBehavior::Provide(module)) => Ok(Arc::clone(module)),
            Some(SourceBehavior::Fail(message)) => anyhow::bail!("{message}"),
            None => Ok(Arc::new(StubModule::new(descriptor.name.clone()))),
        }
    }
}

// ============================================================================
// Recording Presenter and Observer
// ============================================================================

/// A notice presenter that records every notice instead of rendering.
#[derive(Default)]
pub struct RecordingPresenter {
    notices: RwLock<Vec<Notice>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice presented so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.read().clone()
    }

    /// Just the notice texts, in presentation order.
    pub fn texts(&self) -> Vec<String> {
        self.notices.read().iter().map(|n| n.text.clone()).collect()
    }
}

impl NoticePresenter for RecordingPresenter {
    fn present(&self, notice: &Notice) {
        self.notices.write().push(notice.clone());
    }
}

/// A viewport observer that counts connects and disconnects.
#[derive(Debug, Default)]
pub struct StubObserver {
    connects: AtomicU32,
    disconnects: AtomicU32,
    last_margin: AtomicI32,
}

impl StubObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Margin from the config passed to the last connect.
    pub fn last_margin(&self) -> i32 {
        self.last_margin.load(Ordering::SeqCst)
    }
}

impl ViewportObserver for StubObserver {
    fn connect(&self, config: &ViewportConfig) {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.last_margin.store(config.margin_px, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Wiring Helpers
// ============================================================================

/// A catalog of independent modules, priorities following slice order.
pub fn flat_catalog(names: &[&str]) -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    for (index, name) in names.iter().enumerate() {
        catalog.register(ModuleDescriptor::new(*name, *name).with_priority(index as i32 * 10));
    }
    catalog
}

/// Builds a loader with a fresh ready flag and monitor.
pub fn loader_with(
    config: OrchestratorConfig,
    catalog: ModuleCatalog,
    source: Arc<dyn ModuleSource>,
) -> Arc<Loader> {
    Arc::new(Loader::new(
        config,
        catalog,
        source,
        Arc::new(ReadyFlag::new()),
        Arc::new(PerfMonitor::new()),
    ))
}
