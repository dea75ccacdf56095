//! Capability dispatcher: one delegated router for page input events.
//!
//! The embedder owns the single real event listener and forwards each
//! event here as an [`InputEvent`] carrying the ancestor chain of its
//! target. Routing is a fixed declarative table walked in declaration
//! order; the first route whose predicate matches a node in the chain
//! wins, and the node's surrounding container identifies what the route
//! acts on. Capabilities are looked up at dispatch time, so a module that
//! failed to load simply makes its routes degrade (drop, or fall back to
//! plain navigation) instead of erroring.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::error::Error;
use crate::loader::{Loader, ModuleSet};
use crate::notice::{Notice, NoticePresenter};
use crate::ready::ReadyFlag;
use crate::registry::names;

/// Key that dismisses the gallery.
pub const DISMISS_KEY: &str = "Escape";

/// Declarative role a page node may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetRole {
    /// Opens the media gallery.
    GalleryTrigger,
    /// Starts the order flow.
    OrderTrigger,
    /// Plain navigable link.
    NavLink,
}

/// One node in the ancestor chain of an event target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetNode {
    /// Declared role, if the node carries one.
    pub role: Option<TargetRole>,

    /// Stable container id, if the node is a content container.
    pub container: Option<String>,

    /// Link href, if the node is (or wraps) an anchor.
    pub link: Option<String>,
}

impl TargetNode {
    /// Creates a bare node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the role.
    pub fn with_role(mut self, role: TargetRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the container id.
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Sets the link href.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Ancestor chain of an event target, target node first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTarget {
    nodes: Vec<TargetNode>,
}

impl EventTarget {
    /// Creates a chain from target-first nodes.
    pub fn new(nodes: Vec<TargetNode>) -> Self {
        Self { nodes }
    }

    /// Convenience chain of a single node.
    pub fn leaf(node: TargetNode) -> Self {
        Self { nodes: vec![node] }
    }

    /// The chain, target first.
    pub fn nodes(&self) -> &[TargetNode] {
        &self.nodes
    }

    /// Index of the nearest node, walking outward, matching a predicate.
    fn nearest(&self, matches: fn(&TargetNode) -> bool) -> Option<usize> {
        self.nodes.iter().position(matches)
    }

    /// Nearest container id at or above the node at `from`.
    fn container_from(&self, from: usize) -> Option<&str> {
        self.nodes[from..]
            .iter()
            .find_map(|node| node.container.as_deref())
    }

    /// Nearest link at or above the node at `from`.
    fn link_from(&self, from: usize) -> Option<&str> {
        self.nodes[from..].iter().find_map(|node| node.link.as_deref())
    }
}

/// Input events the embedder forwards.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Primary activation (click, tap, keyboard activation) with the
    /// target's ancestor chain.
    PointerActivate(EventTarget),
    /// A key press identified by its logical key name.
    KeyPress {
        /// Logical key name, e.g. `"Escape"`.
        key: String,
    },
}

/// Which route handled an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Gallery open.
    Gallery,
    /// Order flow open.
    Order,
    /// Tracked navigation link.
    NavLink,
    /// Gallery dismissed via the dismiss key.
    GalleryDismiss,
}

/// Why an event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Page not ready yet.
    NotReady,
    /// No route predicate matched the chain.
    NoRouteMatch,
    /// A route matched but no ancestor carries a container id.
    NoContainer,
    /// The capability the route needs is absent (and it has no fallback).
    CapabilityUnavailable,
    /// Key press the dispatcher does not handle.
    UnknownKey,
}

/// The dispatcher's decision, for the embedder and for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event was routed and handled.
    Handled(RouteKind),
    /// The embedder should navigate to this href.
    Navigate(String),
    /// Nothing was done.
    Dropped(DropReason),
}

/// A route: a node predicate plus the kind it handles. Table order is
/// priority order.
struct Route {
    kind: RouteKind,
    matches: fn(&TargetNode) -> bool,
}

const ROUTES: &[Route] = &[
    Route {
        kind: RouteKind::Gallery,
        matches: is_gallery_trigger,
    },
    Route {
        kind: RouteKind::Order,
        matches: is_order_trigger,
    },
    Route {
        kind: RouteKind::NavLink,
        matches: is_nav_link,
    },
];

fn is_gallery_trigger(node: &TargetNode) -> bool {
    node.role == Some(TargetRole::GalleryTrigger)
}

fn is_order_trigger(node: &TargetNode) -> bool {
    node.role == Some(TargetRole::OrderTrigger)
}

fn is_nav_link(node: &TargetNode) -> bool {
    node.role == Some(TargetRole::NavLink) || node.link.is_some()
}

/// First route (in table order) with a matching node, and that node's
/// index in the chain.
fn match_route(target: &EventTarget) -> Option<(RouteKind, usize)> {
    for route in ROUTES {
        if let Some(index) = target.nearest(route.matches) {
            return Some((route.kind, index));
        }
    }
    None
}

/// Routes input events to whichever capabilities are present.
pub struct Dispatcher {
    loader: Arc<Loader>,
    modules: Arc<ModuleSet>,
    ready: Arc<ReadyFlag>,
    presenter: Arc<dyn NoticePresenter>,
    notice_ttl: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher over the loader's module set.
    pub fn new(
        loader: Arc<Loader>,
        presenter: Arc<dyn NoticePresenter>,
        notice_ttl: Duration,
    ) -> Self {
        let modules = loader.module_set();
        let ready = loader.ready_flag();
        Self {
            loader,
            modules,
            ready,
            presenter,
            notice_ttl,
        }
    }

    /// Routes one event. Events before the ready signal are dropped.
    #[instrument(skip(self, event))]
    pub async fn dispatch(&self, event: InputEvent) -> DispatchOutcome {
        if !self.ready.is_ready() {
            debug!("event before ready; dropped");
            return DispatchOutcome::Dropped(DropReason::NotReady);
        }
        match event {
            InputEvent::PointerActivate(target) => self.dispatch_pointer(target).await,
            InputEvent::KeyPress { key } => self.dispatch_key(&key),
        }
    }

    async fn dispatch_pointer(&self, target: EventTarget) -> DispatchOutcome {
        let Some((kind, index)) = match_route(&target) else {
            debug!("no route matched; dropped");
            return DispatchOutcome::Dropped(DropReason::NoRouteMatch);
        };

        match kind {
            RouteKind::Gallery => {
                let Some(container) = target.container_from(index).map(str::to_string) else {
                    debug!("gallery trigger outside any container; dropped");
                    return DispatchOutcome::Dropped(DropReason::NoContainer);
                };
                self.open_gallery(&container).await
            }
            RouteKind::Order => {
                let Some(container) = target.container_from(index).map(str::to_string) else {
                    debug!("order trigger outside any container; dropped");
                    return DispatchOutcome::Dropped(DropReason::NoContainer);
                };
                let fallback = target.link_from(index).map(str::to_string);
                self.open_order(&container, fallback)
            }
            RouteKind::NavLink => {
                let Some(container) = target.container_from(index).map(str::to_string) else {
                    debug!("nav link outside any container; dropped");
                    return DispatchOutcome::Dropped(DropReason::NoContainer);
                };
                let link = target.link_from(index).map(str::to_string);
                self.track_nav(link.as_deref(), &container);
                // Default navigation proceeds in the embedder.
                DispatchOutcome::Handled(RouteKind::NavLink)
            }
            RouteKind::GalleryDismiss => DispatchOutcome::Dropped(DropReason::NoRouteMatch),
        }
    }

    fn dispatch_key(&self, key: &str) -> DispatchOutcome {
        if key != DISMISS_KEY {
            return DispatchOutcome::Dropped(DropReason::UnknownKey);
        }
        match self.modules.gallery() {
            Some(gallery) => {
                gallery.close();
                DispatchOutcome::Handled(RouteKind::GalleryDismiss)
            }
            None => DispatchOutcome::Dropped(DropReason::CapabilityUnavailable),
        }
    }

    /// Opens the gallery, loading the module on demand if it is not
    /// active yet. Still absent after that, the event is dropped.
    async fn open_gallery(&self, container: &str) -> DispatchOutcome {
        let gallery = match self.modules.gallery() {
            Some(gallery) => Some(gallery),
            None => {
                debug!("gallery capability absent; attempting on-demand load");
                self.loader.load_module(names::GALLERY).await;
                self.modules.gallery()
            }
        };

        let Some(gallery) = gallery else {
            let err = Error::capability_unavailable("gallery");
            warn!(container, %err, "dropping gallery open request");
            return DispatchOutcome::Dropped(DropReason::CapabilityUnavailable);
        };

        if let Err(cause) = gallery.open(container) {
            warn!(container, error = %format!("{cause:#}"), "gallery open failed");
            self.present_notice("The gallery could not be opened.");
            return DispatchOutcome::Dropped(DropReason::CapabilityUnavailable);
        }
        DispatchOutcome::Handled(RouteKind::Gallery)
    }

    /// Opens the order flow, or falls back to plain navigation on the
    /// nearest link when the order module is absent.
    fn open_order(&self, container: &str, fallback: Option<String>) -> DispatchOutcome {
        match self.modules.order() {
            Some(order) => {
                if let Err(cause) = order.open_order(container) {
                    warn!(container, error = %format!("{cause:#}"), "order open failed");
                    self.present_notice("Something went wrong starting your order.");
                    return DispatchOutcome::Dropped(DropReason::CapabilityUnavailable);
                }
                DispatchOutcome::Handled(RouteKind::Order)
            }
            None => match fallback {
                Some(link) => {
                    debug!(container, link = %link, "order module absent; direct-link fallback");
                    DispatchOutcome::Navigate(link)
                }
                None => {
                    let err = Error::capability_unavailable("order");
                    warn!(container, %err, "no fallback link; dropped");
                    DispatchOutcome::Dropped(DropReason::CapabilityUnavailable)
                }
            },
        }
    }

    fn track_nav(&self, link: Option<&str>, container: &str) {
        if let Some(tracking) = self.modules.tracking() {
            tracking.track(
                "nav_click",
                json!({ "href": link, "container": container }),
            );
        }
    }

    fn present_notice(&self, text: &str) {
        self.presenter
            .present(&Notice::warning(text, self.notice_ttl));
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("ready", &self.ready.is_ready())
            .field("modules", &self.modules)
            .finish()
    }
}
