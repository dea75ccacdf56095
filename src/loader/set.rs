//! Shared set of active modules and their promoted capabilities.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::traits::{
    DataStoreCapability, FeatureModule, GalleryCapability, OrderCapability, TrackingCapability,
};

/// Explicit service locator for live module handles.
///
/// Loading inserts a handle; successful initialization promotes whatever
/// capabilities the module advertises. Capability lookups therefore only
/// ever see modules that completed their init hook, while `all` still
/// returns every loaded handle so teardown can clean up the rest too.
#[derive(Default)]
pub struct ModuleSet {
    inner: RwLock<Slots>,
}

#[derive(Default)]
struct Slots {
    modules: HashMap<String, Arc<dyn FeatureModule>>,
    gallery: Option<Arc<dyn GalleryCapability>>,
    order: Option<Arc<dyn OrderCapability>>,
    datastore: Option<Arc<dyn DataStoreCapability>>,
    tracking: Option<Arc<dyn TrackingCapability>>,
}

impl ModuleSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a loaded module handle under its name.
    pub fn insert(&self, module: Arc<dyn FeatureModule>) {
        let name = module.name().to_string();
        self.inner.write().modules.insert(name, module);
    }

    /// Promotes an initialized module's capabilities. The first provider
    /// of each capability wins; later providers are ignored.
    pub fn promote(&self, module: &Arc<dyn FeatureModule>) {
        let mut inner = self.inner.write();
        if inner.gallery.is_none() {
            inner.gallery = Arc::clone(module).as_gallery();
        }
        if inner.order.is_none() {
            inner.order = Arc::clone(module).as_order();
        }
        if inner.datastore.is_none() {
            inner.datastore = Arc::clone(module).as_datastore();
        }
        if inner.tracking.is_none() {
            inner.tracking = Arc::clone(module).as_tracking();
        }
    }

    /// Returns the handle for a loaded module.
    pub fn get(&self, name: &str) -> Option<Arc<dyn FeatureModule>> {
        self.inner.read().modules.get(name).cloned()
    }

    /// True if a module with this name is loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().modules.contains_key(name)
    }

    /// Loaded module names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every loaded handle, for teardown.
    pub fn all(&self) -> Vec<Arc<dyn FeatureModule>> {
        self.inner.read().modules.values().cloned().collect()
    }

    /// Number of loaded modules.
    pub fn len(&self) -> usize {
        self.inner.read().modules.len()
    }

    /// True if no modules are loaded.
    pub fn is_empty(&self) -> bool {
        self.inner.read().modules.is_empty()
    }

    /// The promoted gallery capability, if any.
    pub fn gallery(&self) -> Option<Arc<dyn GalleryCapability>> {
        self.inner.read().gallery.clone()
    }

    /// The promoted order capability, if any.
    pub fn order(&self) -> Option<Arc<dyn OrderCapability>> {
        self.inner.read().order.clone()
    }

    /// The promoted data-store capability, if any.
    pub fn datastore(&self) -> Option<Arc<dyn DataStoreCapability>> {
        self.inner.read().datastore.clone()
    }

    /// The promoted tracking capability, if any.
    pub fn tracking(&self) -> Option<Arc<dyn TrackingCapability>> {
        self.inner.read().tracking.clone()
    }
}

impl fmt::Debug for ModuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ModuleSet")
            .field("modules", &inner.modules.keys().collect::<Vec<_>>())
            .field("gallery", &inner.gallery.is_some())
            .field("order", &inner.order.is_some())
            .field("datastore", &inner.datastore.is_some())
            .field("tracking", &inner.tracking.is_some())
            .finish()
    }
}
