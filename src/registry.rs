//! Module catalog: declarative descriptors for every loadable module.
//!
//! The catalog is pure data. It knows nothing about fetching or
//! initialization; it records, per module, where its unit lives, whether
//! the page can survive without it, its load priority, and which other
//! modules must be active before it may load. Registration order is
//! preserved and breaks priority ties, so `load_order` is deterministic.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::DescriptorOverride;
use crate::error::{Error, Result};

/// Well-known module names used by the built-in catalog and the dispatcher.
pub mod names {
    /// Page configuration module.
    pub const CONFIG: &str = "config";
    /// Local cache module.
    pub const CACHE: &str = "cache";
    /// Remote data-store client module.
    pub const DATASTORE: &str = "datastore";
    /// Media gallery module.
    pub const GALLERY: &str = "gallery";
    /// Order-form module.
    pub const ORDER: &str = "order";
    /// Analytics tracking module.
    pub const TRACKING: &str = "tracking";
}

/// Declarative description of one loadable module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique module name.
    pub name: String,

    /// Source reference, resolved against the configured source base
    /// unless it is already absolute.
    pub source: String,

    /// Whether startup must abort when this module fails.
    pub required: bool,

    /// Load priority; lower loads earlier. Ties keep registration order.
    pub priority: i32,

    /// Names of modules that must be active before this one may load.
    #[serde(default)]
    pub depends_on: HashSet<String>,
}

impl ModuleDescriptor {
    /// Creates an optional, late-priority descriptor with no dependencies.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            required: false,
            priority: 100,
            depends_on: HashSet::new(),
        }
    }

    /// Sets the required flag.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the load priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the dependency set.
    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Resolves the fetch location against a source base. Absolute
    /// references (scheme or protocol-relative) are used as-is.
    pub fn resolved_source(&self, base: &str) -> String {
        if self.source.starts_with("http://")
            || self.source.starts_with("https://")
            || self.source.starts_with("//")
        {
            return self.source.clone();
        }
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.source.trim_start_matches('/')
        )
    }

    /// Applies a descriptor override in place.
    pub fn apply(&mut self, over: &DescriptorOverride) {
        if let Some(source) = &over.source {
            self.source = source.clone();
        }
        if let Some(required) = over.required {
            self.required = required;
        }
        if let Some(priority) = over.priority {
            self.priority = priority;
        }
        if let Some(deps) = &over.depends_on {
            self.depends_on = deps.clone();
        }
    }
}

/// Registration-ordered collection of module descriptors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleCatalog {
    entries: IndexMap<String, ModuleDescriptor>,
}

impl ModuleCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-populated with the built-in storefront
    /// modules: config, datastore, cache, order, gallery, tracking.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        for desc in default_descriptors() {
            catalog.register(desc);
        }
        catalog
    }

    /// Registers a descriptor, replacing any existing entry with the same
    /// name. Replacement keeps the original registration position.
    pub fn register(&mut self, descriptor: ModuleDescriptor) {
        self.entries.insert(descriptor.name.clone(), descriptor);
    }

    /// Registers every descriptor in the iterator.
    pub fn register_all(&mut self, descriptors: impl IntoIterator<Item = ModuleDescriptor>) {
        for desc in descriptors {
            self.register(desc);
        }
    }

    /// Returns the descriptor for a module, if registered.
    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.entries.get(name)
    }

    /// Returns true if a module is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns all registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Returns the number of registered modules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies an override to a registered module. Returns false if the
    /// name is unknown.
    pub fn apply_override(&mut self, name: &str, over: &DescriptorOverride) -> bool {
        match self.entries.get_mut(name) {
            Some(desc) => {
                desc.apply(over);
                true
            }
            None => false,
        }
    }

    /// Returns descriptors sorted by ascending priority. The sort is
    /// stable: equal priorities keep registration order.
    pub fn load_order(&self) -> Vec<ModuleDescriptor> {
        let mut order: Vec<ModuleDescriptor> = self.entries.values().cloned().collect();
        order.sort_by_key(|desc| desc.priority);
        order
    }

    /// Validates the catalog: dependency cycles are an error, references
    /// to unregistered modules are logged (they can never be satisfied,
    /// which makes the referencing module unloadable, not the catalog
    /// invalid).
    pub fn validate(&self) -> Result<()> {
        for desc in self.entries.values() {
            if desc.depends_on.contains(&desc.name) {
                return Err(Error::DependencyCycle(vec![desc.name.clone()]));
            }
            for dep in &desc.depends_on {
                if !self.entries.contains_key(dep) {
                    warn!(
                        module = %desc.name,
                        dependency = %dep,
                        "module depends on an unregistered name; it can never load"
                    );
                }
            }
        }

        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices = HashMap::new();
        for name in self.entries.keys() {
            indices.insert(name.as_str(), graph.add_node(name.as_str()));
        }
        for desc in self.entries.values() {
            for dep in &desc.depends_on {
                if let (Some(&from), Some(&to)) = (
                    indices.get(dep.as_str()),
                    indices.get(desc.name.as_str()),
                ) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        // An SCC with more than one node is a cycle; self-loops were
        // rejected above.
        let sccs = tarjan_scc(&graph);
        if let Some(scc) = sccs.into_iter().find(|scc| scc.len() > 1) {
            let cycle = scc.into_iter().map(|idx| graph[idx].to_string()).collect();
            return Err(Error::DependencyCycle(cycle));
        }
        Ok(())
    }
}

/// The built-in storefront catalog.
fn default_descriptors() -> Vec<ModuleDescriptor> {
    vec![
        ModuleDescriptor::new(names::CONFIG, "config")
            .with_required(true)
            .with_priority(0),
        ModuleDescriptor::new(names::DATASTORE, "datastore")
            .with_required(true)
            .with_priority(10)
            .with_depends_on([names::CONFIG]),
        ModuleDescriptor::new(names::CACHE, "cache")
            .with_priority(20)
            .with_depends_on([names::CONFIG]),
        ModuleDescriptor::new(names::ORDER, "order")
            .with_priority(30)
            .with_depends_on([names::CONFIG, names::DATASTORE]),
        ModuleDescriptor::new(names::GALLERY, "gallery").with_priority(40),
        ModuleDescriptor::new(names::TRACKING, "tracking")
            .with_priority(50)
            .with_depends_on([names::CONFIG]),
    ]
}
