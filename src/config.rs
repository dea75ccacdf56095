//! Configuration for the orchestrator.
//!
//! All configuration is supplied in memory by the embedder; there is no
//! on-disk format and no environment lookup. [`OrchestratorConfig`] carries
//! page-lifetime settings with built-in defaults, [`InitOptions`] carries
//! the per-startup overrides accepted by the first `init()` call.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Base reference joined with each descriptor's source to form the
    /// fetch location (e.g. `/modules`).
    pub source_base: String,

    /// Canonical initialization order. Loaded modules not listed here run
    /// their init hooks afterwards, in load order.
    pub init_order: Vec<String>,

    /// Viewport observation settings handed to the embedder's observer.
    pub viewport: ViewportConfig,

    /// Maximum number of containers per lazy-load batch.
    pub batch_size: usize,

    /// Enables performance reporting. Off by default; when off, the
    /// monitor spawns no background tasks at all.
    pub debug: bool,

    /// Delay before the one-shot performance report after startup.
    #[serde(with = "humantime_serde")]
    pub report_delay: Duration,

    /// Interval between recurring performance reports.
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,

    /// How long a transient user notice stays visible.
    #[serde(with = "humantime_serde")]
    pub notice_ttl: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            source_base: "/modules".to_string(),
            init_order: vec![
                "config".to_string(),
                "cache".to_string(),
                "datastore".to_string(),
                "gallery".to_string(),
                "order".to_string(),
                "tracking".to_string(),
            ],
            viewport: ViewportConfig::default(),
            batch_size: 20,
            debug: false,
            report_delay: Duration::from_secs(5),
            report_interval: Duration::from_secs(60),
            notice_ttl: Duration::from_secs(4),
        }
    }
}

impl OrchestratorConfig {
    /// Validates the configuration, rejecting values the scheduler or
    /// observer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.viewport.threshold) {
            return Err(Error::Config(format!(
                "viewport threshold must be within 0.0..=1.0, got {}",
                self.viewport.threshold
            )));
        }
        if self.init_order.iter().any(|name| name.is_empty()) {
            return Err(Error::Config(
                "init_order entries must be non-empty names".to_string(),
            ));
        }
        Ok(())
    }
}

/// Viewport observation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Extra margin around the viewport, in pixels. Containers within this
    /// margin count as visible so their data loads before they scroll in.
    pub margin_px: i32,

    /// Fraction of a container that must intersect the (expanded) viewport
    /// before it is reported visible.
    pub threshold: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            margin_px: 200,
            threshold: 0.1,
        }
    }
}

/// Per-startup options accepted by `init()`.
///
/// Only the call that actually runs the startup sequence applies these;
/// concurrent and later callers share the memoized outcome and their
/// options are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitOptions {
    /// Overrides the configured source base for this page.
    pub source_base: Option<String>,

    /// Overrides the viewport observation settings for this page. An
    /// override with an out-of-range threshold is logged and ignored.
    pub viewport: Option<ViewportConfig>,

    /// Overrides the lazy-load batch size for this page. Values below 1
    /// are treated as 1.
    pub batch_size: Option<usize>,

    /// Per-module descriptor overrides, keyed by module name. Names not
    /// present in the catalog are logged and ignored.
    pub modules: HashMap<String, DescriptorOverride>,
}

impl InitOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source base override.
    pub fn with_source_base(mut self, base: impl Into<String>) -> Self {
        self.source_base = Some(base.into());
        self
    }

    /// Sets the viewport override.
    pub fn with_viewport(mut self, viewport: ViewportConfig) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Sets the batch size override.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Adds a descriptor override for one module.
    pub fn with_module(mut self, name: impl Into<String>, over: DescriptorOverride) -> Self {
        self.modules.insert(name.into(), over);
        self
    }
}

/// Overrides for a single registered module descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorOverride {
    /// Replacement source reference.
    pub source: Option<String>,

    /// Replacement required flag.
    pub required: Option<bool>,

    /// Replacement load priority.
    pub priority: Option<i32>,

    /// Replacement dependency set.
    pub depends_on: Option<HashSet<String>>,
}

impl DescriptorOverride {
    /// Creates an empty override.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source reference.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the required flag.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Sets the load priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the dependency set.
    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = Some(deps.into_iter().map(Into::into).collect());
        self
    }
}
