//! Core traits defining the contracts between the orchestrator and its
//! collaborators.
//!
//! The orchestrator never touches the page directly. Everything
//! environment-specific arrives through these traits: the module units it
//! loads ([`FeatureModule`]), the transport that fetches them
//! ([`ModuleSource`]), the viewport wiring ([`ViewportObserver`]), and the
//! typed capabilities feature modules may expose. A capability is either
//! present (`Some`) or absent (`None`); callers match on that instead of
//! probing for methods.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ViewportConfig;
use crate::registry::ModuleDescriptor;

// ============================================================================
// Feature Module Contract
// ============================================================================

/// A loadable unit of page functionality.
///
/// Feature modules are fetched through a [`ModuleSource`], initialized once
/// in the canonical order, and cleaned up exactly once at teardown. A module
/// advertises what it can do by overriding the capability accessors; every
/// accessor defaults to absent.
///
/// # Example
///
/// ```rust,ignore
/// use showrunner::traits::{FeatureModule, GalleryCapability};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct Gallery;
///
/// impl GalleryCapability for Gallery {
///     fn open(&self, container: &str) -> anyhow::Result<()> {
///         // mount the lightbox for `container`
///         Ok(())
///     }
///     fn close(&self) {}
/// }
///
/// #[async_trait::async_trait]
/// impl FeatureModule for Gallery {
///     fn name(&self) -> &str {
///         "gallery"
///     }
///     fn as_gallery(self: Arc<Self>) -> Option<Arc<dyn GalleryCapability>> {
///         Some(self)
///     }
/// }
/// ```
#[async_trait]
pub trait FeatureModule: Send + Sync + Debug {
    /// Returns the unique name of this module.
    fn name(&self) -> &str;

    /// Runs the module's one-time initialization hook.
    ///
    /// Called after the load phase, in the canonical init order. A module
    /// without setup work keeps the default.
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Releases everything the module holds (listeners, timers, caches).
    ///
    /// Called exactly once per module, from the teardown hook. Must not
    /// panic when the module never finished initializing.
    fn cleanup(&self) {}

    /// Gallery capability, if this module provides one.
    fn as_gallery(self: Arc<Self>) -> Option<Arc<dyn GalleryCapability>> {
        None
    }

    /// Order-form capability, if this module provides one.
    fn as_order(self: Arc<Self>) -> Option<Arc<dyn OrderCapability>> {
        None
    }

    /// Data-store capability, if this module provides one.
    fn as_datastore(self: Arc<Self>) -> Option<Arc<dyn DataStoreCapability>> {
        None
    }

    /// Tracking capability, if this module provides one.
    fn as_tracking(self: Arc<Self>) -> Option<Arc<dyn TrackingCapability>> {
        None
    }
}

// ============================================================================
// Capability Traits
// ============================================================================

/// Media gallery surface: open a lightbox for a container, close it again.
pub trait GalleryCapability: Send + Sync {
    /// Opens the gallery for the given content container.
    fn open(&self, container: &str) -> anyhow::Result<()>;

    /// Closes the gallery if it is open; no-op otherwise.
    fn close(&self);
}

/// Order-form surface.
pub trait OrderCapability: Send + Sync {
    /// Opens the order flow for the given content container.
    fn open_order(&self, container: &str) -> anyhow::Result<()>;
}

/// Remote data-store client used by the lazy-load scheduler.
#[async_trait]
pub trait DataStoreCapability: Send + Sync {
    /// Fetches remote data for a batch of containers in one grouped
    /// request. The scheduler awaits each call before dispatching the
    /// next batch.
    async fn fetch_batch(&self, containers: &[String]) -> anyhow::Result<()>;
}

/// Analytics sink. Fire-and-forget: tracking must never fail the caller.
pub trait TrackingCapability: Send + Sync {
    /// Records one event with a structured payload.
    fn track(&self, event: &str, payload: serde_json::Value);
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Transport that fetches and evaluates module units.
///
/// Implementations own everything transport-specific, including deadlines;
/// the orchestrator applies no timeout of its own and memoizes the outcome
/// (success or failure) per module for its lifetime.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Fetches the unit for `descriptor` from `location` (the descriptor's
    /// source resolved against the configured base) and returns the live
    /// module handle.
    async fn fetch(
        &self,
        descriptor: &ModuleDescriptor,
        location: &str,
    ) -> anyhow::Result<Arc<dyn FeatureModule>>;
}

/// Embedder-side viewport wiring.
///
/// The embedder observes its content containers and forwards visibility
/// reports to the scheduler; the orchestrator only decides when observation
/// starts and stops.
pub trait ViewportObserver: Send + Sync {
    /// Starts observing content containers with the given settings.
    /// Called once, after the ready signal.
    fn connect(&self, config: &ViewportConfig);

    /// Stops observing and drops all pending reports. Called at most
    /// once, from teardown.
    fn disconnect(&self);
}
