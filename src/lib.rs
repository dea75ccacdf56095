//! # Showrunner - Client Runtime Orchestration for Storefront Pages
//!
//! Showrunner is an async-first orchestration library for feature-module
//! runtimes. It loads feature modules in dependency order, initializes each
//! of them exactly once, hydrates viewport content in distance-sorted
//! batches, and routes page interaction events to whichever capabilities
//! are live, all behind a single memoized startup sequence.
//!
//! ## Core Concepts
//!
//! - **Catalog**: Declarative registry of module descriptors (source, priority, dependencies)
//! - **Loader**: Memoized startup engine that fetches and initializes modules exactly once
//! - **Capabilities**: Typed interfaces (gallery, order, datastore, tracking) promoted from live modules
//! - **Dispatcher**: Routes clicks and key presses to capabilities via a fixed route table
//! - **Scheduler**: Coalesces viewport visibility reports into sequential datastore batches
//! - **Monitor**: Named marks and measures for startup timing, with optional periodic reports
//! - **Teardown**: Idempotent shutdown that stops background work and runs module cleanup hooks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           Orchestrator                               │
//! │                 (builder-wired runtime façade)                       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │     Loader      │   │     Dispatcher      │   │    LazyScheduler    │
//! │   (memoized     │   │   (route table for  │   │  (distance-sorted   │
//! │    startup)     │   │    clicks + keys)   │   │   batch hydration)  │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!          │                         │                         │
//!          └─────────────────────────┼─────────────────────────┘
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   ModuleSet (live capability slots)                  │
//! │              gallery / order / datastore / tracking                  │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │              Feature Modules (fetched via ModuleSource)              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use showrunner::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Wire the runtime against a module source (script loader, bundle
//!     // registry, ...) and the default storefront catalog.
//!     let orchestrator = Orchestrator::builder(Arc::new(MyScriptSource::new()))
//!         .with_config(OrchestratorConfig::default())
//!         .build()?;
//!
//!     // Fetch and initialize every registered module, in dependency order.
//!     // Concurrent callers join the same startup sequence.
//!     if orchestrator.start(InitOptions::new()).await {
//!         println!("runtime ready: {:?}", orchestrator.status());
//!     }
//!
//!     // Route a page interaction to whichever capability claims it.
//!     let outcome = orchestrator
//!         .dispatch(InputEvent::KeyPress {
//!             key: "Escape".to_string(),
//!         })
//!         .await;
//!     println!("dispatched: {outcome:?}");
//!
//!     // Idempotent: stops the scheduler, disconnects the viewport
//!     // observer, and runs every module's cleanup hook exactly once.
//!     orchestrator.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.
    //!
    //! This prelude provides quick access to the most commonly needed types:
    //!
    //! - **Runtime**: The [`Orchestrator`] façade and its builder
    //! - **Catalog**: Module descriptors and the catalog they live in
    //! - **Loading**: The loader, its state snapshots, and the ready signal
    //! - **Interaction**: Dispatcher events, outcomes, and viewport entries
    //! - **Errors**: Error handling types
    //!
    //! # Example
    //!
    //! ```rust,ignore
    //! use showrunner::prelude::*;
    //!
    //! #[tokio::main]
    //! async fn main() -> Result<()> {
    //!     let orchestrator = Orchestrator::builder(source)
    //!         .with_config(OrchestratorConfig::default())
    //!         .build()?;
    //!
    //!     orchestrator.start(InitOptions::new()).await;
    //!     Ok(())
    //! }
    //! ```

    // Configuration
    pub use crate::config::{DescriptorOverride, InitOptions, OrchestratorConfig, ViewportConfig};

    // Error handling
    pub use crate::error::{Error, Result};

    // Event dispatch
    pub use crate::dispatch::{
        DispatchOutcome, Dispatcher, DropReason, EventTarget, InputEvent, RouteKind, TargetNode,
        TargetRole,
    };

    // Lifecycle
    pub use crate::lifecycle::Teardown;

    // Module loading
    pub use crate::loader::{Loader, LoaderState, ModuleSet, StatusSnapshot};

    // Performance monitoring
    pub use crate::monitor::PerfMonitor;

    // Notices
    pub use crate::notice::{LogNoticePresenter, Notice, NoticeLevel, NoticePresenter};

    // Runtime façade
    pub use crate::orchestrator::{Orchestrator, OrchestratorBuilder};

    // Ready signal
    pub use crate::ready::{ReadyFlag, ReadySignal};

    // Module catalog
    pub use crate::registry::{names, ModuleCatalog, ModuleDescriptor};

    // Viewport scheduling
    pub use crate::scheduler::{LazyScheduler, SchedulerStats, ViewportEntry};

    // Core traits
    pub use crate::traits::*;
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for showrunner operations.
///
/// This module provides the main [`Error`](error::Error) enum that covers all
/// possible error conditions in showrunner, including module fetch and init
/// failures, unmet or cyclic dependencies, and missing capabilities.
pub mod error;

/// Core traits that define the interfaces for pluggable components.
///
/// Contains the [`FeatureModule`](traits::FeatureModule) trait implemented by
/// every loadable module, the capability traits promoted from live modules,
/// and the host-side collaborators (module source, viewport observer).
pub mod traits;

/// Configuration for the orchestrator and its collaborators.
///
/// Handles the static runtime configuration (batch sizes, init order, report
/// cadence) as well as the per-startup [`InitOptions`](config::InitOptions)
/// overrides a page can pass to [`Orchestrator::start`](orchestrator::Orchestrator::start).
pub mod config;

// ============================================================================
// Module Catalog and Loading
// ============================================================================

/// Module catalog: descriptors, priorities, and dependency validation.
///
/// The catalog is the declarative side of the runtime. Each
/// [`ModuleDescriptor`](registry::ModuleDescriptor) names a module, where to
/// fetch it from, how urgent it is, and which other modules it depends on.
/// Validation rejects dependency cycles before startup ever runs.
pub mod registry;

/// Core module loading engine with memoized startup.
///
/// This module provides the [`Loader`](loader::Loader) that orchestrates
/// fetching and initializing feature modules. Key properties include:
/// - **Memoized startup**: Concurrent `init` calls join one shared sequence
/// - **Per-module coalescing**: Each fetch and each init hook runs at most once
/// - **Dependency gating**: Modules with unmet dependencies are never fetched
/// - **Required vs optional**: Required failures abort startup, optional ones are recorded
///
/// # Example
///
/// ```rust,ignore
/// use showrunner::loader::Loader;
///
/// let loader = Loader::new(config, catalog, source, ready, monitor);
/// let ok = Arc::clone(&loader).init(InitOptions::new()).await;
/// ```
pub mod loader;

/// Page-ready signal with first-write-wins semantics.
///
/// The [`ReadyFlag`](ready::ReadyFlag) latches a single
/// [`ReadySignal`](ready::ReadySignal) when startup completes and lets
/// consumers either poll it or await the transition over a watch channel.
pub mod ready;

// ============================================================================
// Interaction and Hydration
// ============================================================================

/// Interaction event dispatch over a fixed route table.
///
/// The [`Dispatcher`](dispatch::Dispatcher) resolves clicks and key presses
/// against live capabilities:
/// - **Route precedence**: The route table order wins, not ancestor proximity
/// - **Ancestor walk**: Targets carry their ancestor chain, innermost first
/// - **On-demand loading**: A gallery click may trigger a late module load
/// - **Fallbacks**: An absent order capability degrades to plain navigation
pub mod dispatch;

/// Viewport-driven lazy hydration in sequential batches.
///
/// The [`LazyScheduler`](scheduler::LazyScheduler) claims newly visible
/// containers exactly once, sorts them by distance from the viewport, and
/// hydrates them through the datastore capability one batch at a time.
pub mod scheduler;

// ============================================================================
// Observability
// ============================================================================

/// Startup timing marks, measures, and periodic performance reports.
///
/// The [`PerfMonitor`](monitor::PerfMonitor) records named instants and the
/// durations between them. When debug mode is on, the orchestrator spawns
/// background tasks that log a structured timing report once after startup
/// and again on a fixed interval.
pub mod monitor;

/// User-facing notices for degraded interactions.
///
/// A [`Notice`](notice::Notice) is a short, leveled message with a display
/// TTL, handed to whatever [`NoticePresenter`](notice::NoticePresenter) the
/// host page wired in.
pub mod notice;

// ============================================================================
// Runtime Façade and Lifecycle
// ============================================================================

/// The orchestrator façade that wires and drives the whole runtime.
///
/// [`Orchestrator`](orchestrator::Orchestrator) owns the loader, dispatcher,
/// scheduler, monitor, and teardown, and exposes the page-facing API:
/// `start`, `dispatch`, `on_visibility`, `status`, and `shutdown`.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::builder(source)
///     .with_config(config)
///     .with_observer(observer)
///     .build()?;
/// orchestrator.start(InitOptions::new()).await;
/// ```
pub mod orchestrator;

/// Idempotent runtime teardown.
///
/// [`Teardown`](lifecycle::Teardown) stops the scheduler, disconnects the
/// viewport observer, aborts reporting tasks, and runs every loaded module's
/// cleanup hook exactly once, no matter how many times it is invoked.
pub mod lifecycle;

// ============================================================================
// Version Information
// ============================================================================

/// The crate version stamped into every [`ReadySignal`](ready::ReadySignal).
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
