//! Error types for the showrunner orchestrator.
//!
//! This module defines the error types used throughout the crate, covering
//! catalog validation, module loading and initialization, and capability
//! dispatch. Collaborator-supplied failures (module sources, capability
//! implementations) arrive as [`anyhow::Error`] and are flattened into the
//! variants here at the orchestration boundary.

use thiserror::Error;

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Catalog Errors
    // ========================================================================
    /// A module's dependencies were not active when its load was attempted.
    #[error("Module '{module}' has unmet dependencies: {}", missing.join(", "))]
    DependencyUnmet {
        /// Module whose load was refused
        module: String,
        /// Dependencies that were not loaded
        missing: Vec<String>,
    },

    /// The registered catalog contains a dependency cycle.
    #[error("Dependency cycle detected: {}", format_cycle(.0))]
    DependencyCycle(Vec<String>),

    // ========================================================================
    // Load Errors
    // ========================================================================
    /// Fetching a module unit from its source failed.
    #[error("Failed to fetch module '{module}' from '{location}': {reason}")]
    ModuleFetchFailed {
        /// Module name
        module: String,
        /// Resolved fetch location
        location: String,
        /// Flattened cause
        reason: String,
    },

    /// A fetched module's init hook returned an error.
    #[error("Module '{module}' failed to initialize: {reason}")]
    ModuleInitFailed {
        /// Module name
        module: String,
        /// Flattened cause
        reason: String,
    },

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// An event route needed a capability no active module provides.
    #[error("Capability '{capability}' is unavailable")]
    CapabilityUnavailable {
        /// Capability name
        capability: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a new unmet-dependency error.
    pub fn dependency_unmet(module: impl Into<String>, missing: Vec<String>) -> Self {
        Self::DependencyUnmet {
            module: module.into(),
            missing,
        }
    }

    /// Creates a new module fetch error from a collaborator failure.
    pub fn fetch_failed(
        module: impl Into<String>,
        location: impl Into<String>,
        cause: &anyhow::Error,
    ) -> Self {
        Self::ModuleFetchFailed {
            module: module.into(),
            location: location.into(),
            reason: format!("{cause:#}"),
        }
    }

    /// Creates a new module init error from a collaborator failure.
    pub fn init_failed(module: impl Into<String>, cause: &anyhow::Error) -> Self {
        Self::ModuleInitFailed {
            module: module.into(),
            reason: format!("{cause:#}"),
        }
    }

    /// Creates a new capability-unavailable error.
    pub fn capability_unavailable(capability: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            capability: capability.into(),
        }
    }

    /// Returns the module name this error concerns, if any.
    pub fn module_name(&self) -> Option<&str> {
        match self {
            Error::DependencyUnmet { module, .. }
            | Error::ModuleFetchFailed { module, .. }
            | Error::ModuleInitFailed { module, .. } => Some(module),
            _ => None,
        }
    }
}

/// Formats a cycle path as `a -> b -> a` for display.
fn format_cycle(cycle: &[String]) -> String {
    if cycle.is_empty() {
        return "<empty>".to_string();
    }
    let mut path = cycle.join(" -> ");
    path.push_str(" -> ");
    path.push_str(&cycle[0]);
    path
}
