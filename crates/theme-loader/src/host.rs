/*
 * host.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Defines the DocumentHost trait and supporting types for the loader.
 *
 * The loader never touches a DOM directly. Everything it needs from the page
 * goes through this trait, allowing it to run against different documents:
 * - WebDocument: the browser DOM via web-sys (wasm-theme-loader crate)
 * - MemoryDocument: an in-memory document for headless use and tests
 */

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HostResult;

/// Parsing state of the document, mirroring `document.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// The document is still being parsed
    Loading,
    /// Parsing finished, subresources may still be loading
    Interactive,
    /// Document and subresources have finished loading
    Complete,
}

impl ReadyState {
    /// Parse the string form reported by browsers.
    ///
    /// Unknown values are treated as `Complete` so the loader never waits on a
    /// ready signal that will not come.
    pub fn from_dom(value: &str) -> Self {
        match value {
            "loading" => ReadyState::Loading,
            "interactive" => ReadyState::Interactive,
            _ => ReadyState::Complete,
        }
    }
}

/// Destination of a fetched resource, used as the `as` attribute of preload hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Style,
    Script,
    Image,
    Font,
    Fetch,
}

impl ResourceKind {
    /// The value used for the `as` attribute
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Style => "style",
            ResourceKind::Script => "script",
            ResourceKind::Image => "image",
            ResourceKind::Font => "font",
            ResourceKind::Fetch => "fetch",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node the loader asks the host to append to `<head>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadElement {
    /// `<script src async>`
    Script { src: String, is_async: bool },
    /// `<link rel="stylesheet" href>`
    Stylesheet { href: String },
    /// `<link rel="preload" href as>`
    Preload { href: String, kind: ResourceKind },
}

impl HeadElement {
    /// URL the element points at
    pub fn url(&self) -> &str {
        match self {
            HeadElement::Script { src, .. } => src,
            HeadElement::Stylesheet { href } | HeadElement::Preload { href, .. } => href,
        }
    }

    /// Tag name of the node to create
    pub fn tag_name(&self) -> &'static str {
        match self {
            HeadElement::Script { .. } => "script",
            HeadElement::Stylesheet { .. } | HeadElement::Preload { .. } => "link",
        }
    }

    /// Attributes to set on the created node, in insertion order.
    pub fn attributes(&self) -> Vec<(&'static str, &str)> {
        match self {
            HeadElement::Script { src, is_async } => {
                let mut attrs = vec![("src", src.as_str())];
                if *is_async {
                    attrs.push(("async", ""));
                }
                attrs
            }
            HeadElement::Stylesheet { href } => vec![("rel", "stylesheet"), ("href", href)],
            HeadElement::Preload { href, kind } => {
                vec![("rel", "preload"), ("href", href), ("as", kind.as_str())]
            }
        }
    }
}

/// How a script or stylesheet fetch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The node fired `load`
    Loaded,
    /// The node fired `error`, with whatever detail the host could gather
    Failed(String),
}

/// Invoked once when an appended script or stylesheet settles
pub type SettleCallback = Box<dyn FnOnce(LoadOutcome)>;

/// Invoked for every dispatch of a registered event
pub type EventHandler = Box<dyn FnMut()>;

/// Invoked once when a timer expires or the document becomes ready
pub type OneShotHandler = Box<dyn FnOnce()>;

/// Options for event listener registration (`addEventListener` options bag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation
    pub once: bool,
    /// Promise never to call `preventDefault`
    pub passive: bool,
}

impl ListenerOptions {
    /// One-shot listener that never blocks the default action
    pub const fn once_passive() -> Self {
        Self {
            once: true,
            passive: true,
        }
    }
}

/// Options used to construct an intersection observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions {
    /// CSS margin around the viewport, e.g. `"50px 0px"`
    pub root_margin: String,
    /// Minimal visible ratio that counts as intersecting
    pub threshold: f64,
}

/// One entry of an intersection change batch.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry<N> {
    pub target: N,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

/// A live intersection observer owned by the loader.
pub trait IntersectionObserver<N> {
    /// Start reporting intersection changes for `node`
    fn observe(&self, node: &N);

    /// Stop reporting intersection changes for `node`
    fn unobserve(&self, node: &N);

    /// Stop reporting for every node
    fn disconnect(&self);
}

/// Receives intersection batches along with the observer that produced them.
pub type IntersectionCallback<N> =
    Box<dyn FnMut(Vec<IntersectionEntry<N>>, &dyn IntersectionObserver<N>)>;

/// The DOM-like capability surface the loader drives.
///
/// All methods take `&self`: hosts run on a single-threaded event loop and
/// use interior mutability for their own state. Implementations must never
/// hold an internal borrow while invoking a callback handed to them, since
/// callbacks re-enter the loader and through it the host.
///
/// Absent capabilities are reported, not faked: a host without intersection
/// observation returns `None` from [`DocumentHost::create_intersection_observer`].
pub trait DocumentHost {
    /// Handle to a markup node. Identity is the node itself.
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    // ═══════════════════════════════════════════════════════════════════════
    // DOCUMENT LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Current parsing state
    fn ready_state(&self) -> ReadyState;

    /// Run `callback` once when the initial parse finishes (`DOMContentLoaded`).
    fn on_ready(&self, callback: OneShotHandler);

    // ═══════════════════════════════════════════════════════════════════════
    // NODES
    // ═══════════════════════════════════════════════════════════════════════

    /// All nodes matching a CSS selector, in document order.
    ///
    /// An empty result is a valid answer, not an error.
    fn query_selector_all(&self, selector: &str) -> Vec<Self::Node>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);

    fn remove_attribute(&self, node: &Self::Node, name: &str);

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    fn add_class(&self, node: &Self::Node, class: &str);

    fn remove_class(&self, node: &Self::Node, class: &str);

    /// Create `element` and append it to `<head>`.
    ///
    /// For scripts and stylesheets `on_settle` is invoked exactly once when
    /// the fetch ends. When this returns `Err`, `on_settle` must not be called.
    fn append_to_head(
        &self,
        element: HeadElement,
        on_settle: Option<SettleCallback>,
    ) -> HostResult<()>;

    // ═══════════════════════════════════════════════════════════════════════
    // EVENTS AND TIMERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Register a document-level event listener.
    fn add_event_listener(&self, event: &str, options: ListenerOptions, handler: EventHandler);

    /// Run `handler` once after `delay`.
    fn set_timeout(&self, delay: Duration, handler: OneShotHandler);

    // ═══════════════════════════════════════════════════════════════════════
    // CAPABILITIES
    // ═══════════════════════════════════════════════════════════════════════

    /// Acquire a viewport intersection observer, or `None` when unsupported.
    fn create_intersection_observer(
        &self,
        options: &ObserverOptions,
        callback: IntersectionCallback<Self::Node>,
    ) -> Option<Box<dyn IntersectionObserver<Self::Node>>>;
}
