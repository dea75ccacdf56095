//! Bookkeeping for the load and init phases.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Mutable record of what the loader has done so far.
///
/// `loaded` answers dependency checks in O(1); `load_sequence` remembers
/// the order successes happened in, which the init phase needs for modules
/// outside the canonical order.
#[derive(Debug, Default)]
pub struct LoaderState {
    attempted: HashSet<String>,
    loaded: HashSet<String>,
    load_sequence: Vec<String>,
    initialized: HashSet<String>,
    failures: Vec<Error>,
}

impl LoaderState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a load attempt for a module has started.
    pub fn record_attempted(&mut self, name: impl Into<String>) {
        self.attempted.insert(name.into());
    }

    /// Records a successful load.
    pub fn record_loaded(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.loaded.insert(name.clone()) {
            self.load_sequence.push(name);
        }
    }

    /// Records a successful init.
    pub fn record_initialized(&mut self, name: impl Into<String>) {
        self.initialized.insert(name.into());
    }

    /// Records a failure.
    pub fn record_failure(&mut self, error: Error) {
        self.failures.push(error);
    }

    /// True if a load was ever attempted for this module.
    pub fn is_attempted(&self, name: &str) -> bool {
        self.attempted.contains(name)
    }

    /// True if the module is loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    /// True if the module finished its init hook.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.initialized.contains(name)
    }

    /// Loaded module names in the order they finished loading.
    pub fn load_sequence(&self) -> &[String] {
        &self.load_sequence
    }

    /// Number of loaded modules.
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// All recorded failures.
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }
}

/// Serializable point-in-time view of the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Loaded module names, sorted.
    pub loaded: Vec<String>,

    /// Initialized module names, sorted.
    pub initialized: Vec<String>,

    /// Whether the ready signal has been published.
    pub ready: bool,

    /// Formatted failures recorded so far.
    pub failures: Vec<String>,
}

impl StatusSnapshot {
    /// Captures the current state. Name lists are sorted so snapshots are
    /// deterministic regardless of set iteration order.
    pub fn capture(state: &LoaderState, ready: bool) -> Self {
        let mut loaded: Vec<String> = state.loaded.iter().cloned().collect();
        loaded.sort();
        let mut initialized: Vec<String> = state.initialized.iter().cloned().collect();
        initialized.sort();
        Self {
            loaded,
            initialized,
            ready,
            failures: state.failures.iter().map(|e| e.to_string()).collect(),
        }
    }
}
