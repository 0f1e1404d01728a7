/*
 * memory.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * MemoryDocument: an in-memory DocumentHost.
 *
 * Nothing here touches a network or a real event loop. Instead the document
 * exposes drivers that play the platform's part:
 * - finish_parsing() fires the ready signal
 * - complete_load() / fail_load() settle appended scripts and stylesheets
 * - dispatch_event() and advance() fire listeners and timers
 * - scroll_into_view() reports intersections for observed nodes
 *
 * Every host call the loader makes is recorded in a journal so callers can
 * assert on ordering.
 */

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::error::{HostError, HostResult};
use crate::host::{
    DocumentHost, EventHandler, HeadElement, IntersectionCallback, IntersectionEntry,
    IntersectionObserver, ListenerOptions, LoadOutcome, ObserverOptions, OneShotHandler,
    ReadyState, SettleCallback,
};

/// Handle to a node of a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Query(String),
    SetAttribute {
        node: NodeId,
        name: String,
        value: String,
    },
    RemoveAttribute {
        node: NodeId,
        name: String,
    },
    AddClass {
        node: NodeId,
        class: String,
    },
    RemoveClass {
        node: NodeId,
        class: String,
    },
    AppendToHead(HeadElement),
    AddEventListener {
        event: String,
        options: ListenerOptions,
    },
    SetTimeout(Duration),
    CreateObserver(ObserverOptions),
    Observe(NodeId),
    Unobserve(NodeId),
}

type Journal = Rc<RefCell<Vec<HostCall>>>;

#[derive(Debug)]
struct MemoryNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
}

struct HeadEntry {
    element: HeadElement,
    on_settle: Option<SettleCallback>,
}

struct Listener {
    id: usize,
    event: String,
    options: ListenerOptions,
    handler: Option<EventHandler>,
}

struct Timer {
    id: usize,
    due: Duration,
    handler: OneShotHandler,
}

struct ObserverState {
    options: ObserverOptions,
    observed: RefCell<Vec<NodeId>>,
    callback: RefCell<Option<IntersectionCallback<NodeId>>>,
    disconnected: Cell<bool>,
    journal: Journal,
}

/// Observer handle given to the loader and passed back into its callback.
struct MemoryObserver(Rc<ObserverState>);

impl IntersectionObserver<NodeId> for MemoryObserver {
    fn observe(&self, node: &NodeId) {
        self.0.journal.borrow_mut().push(HostCall::Observe(*node));
        let mut observed = self.0.observed.borrow_mut();
        if !observed.contains(node) {
            observed.push(*node);
        }
    }

    fn unobserve(&self, node: &NodeId) {
        self.0.journal.borrow_mut().push(HostCall::Unobserve(*node));
        self.0.observed.borrow_mut().retain(|n| n != node);
    }

    fn disconnect(&self) {
        self.0.observed.borrow_mut().clear();
        self.0.disconnected.set(true);
    }
}

/// Simple selector: optional tag name and optional `[attribute]` presence test.
#[derive(Debug, PartialEq, Eq)]
struct SimpleSelector {
    tag: Option<String>,
    attribute: Option<String>,
}

impl SimpleSelector {
    fn parse(selector: &str) -> Option<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }
        let (tag, attribute) = match selector.split_once('[') {
            Some((tag, rest)) => (tag, Some(rest.strip_suffix(']')?.trim())),
            None => (selector, None),
        };
        let valid = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid(tag) || attribute.is_some_and(|a| a.is_empty() || !valid(a)) {
            return None;
        }
        Some(Self {
            tag: (!tag.is_empty()).then(|| tag.to_ascii_lowercase()),
            attribute: attribute.map(str::to_string),
        })
    }

    fn matches(&self, node: &MemoryNode) -> bool {
        self.tag.as_ref().is_none_or(|tag| *tag == node.tag)
            && self
                .attribute
                .as_ref()
                .is_none_or(|attr| node.attributes.contains_key(attr))
    }
}

/// In-memory document implementing [`DocumentHost`].
///
/// Supports selector lists of `tag`, `[attr]` and `tag[attr]`; anything more
/// elaborate matches nothing.
pub struct MemoryDocument {
    nodes: RefCell<Vec<MemoryNode>>,
    ready_state: Cell<ReadyState>,
    ready_callbacks: RefCell<Vec<OneShotHandler>>,
    has_head: bool,
    head: RefCell<Vec<HeadEntry>>,
    listeners: RefCell<Vec<Listener>>,
    timers: RefCell<Vec<Timer>>,
    clock: Cell<Duration>,
    next_id: Cell<usize>,
    intersection_supported: bool,
    observers: RefCell<Vec<Rc<ObserverState>>>,
    journal: Journal,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// A parsed document with a `<head>` and intersection observation.
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
            ready_state: Cell::new(ReadyState::Interactive),
            ready_callbacks: RefCell::new(Vec::new()),
            has_head: true,
            head: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
            clock: Cell::new(Duration::ZERO),
            next_id: Cell::new(0),
            intersection_supported: true,
            observers: RefCell::new(Vec::new()),
            journal: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Start in the `loading` state; call [`MemoryDocument::finish_parsing`] to
    /// fire the ready signal.
    pub fn parsing(self) -> Self {
        self.ready_state.set(ReadyState::Loading);
        self
    }

    /// Report intersection observation as unsupported.
    pub fn without_intersection_observer(mut self) -> Self {
        self.intersection_supported = false;
        self
    }

    /// Drop the `<head>`, so every append fails.
    pub fn without_head(mut self) -> Self {
        self.has_head = false;
        self
    }

    fn next_id(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn record(&self, call: HostCall) {
        self.journal.borrow_mut().push(call);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // BUILDING
    // ═══════════════════════════════════════════════════════════════════════

    /// Add a body element with the given attributes.
    pub fn add_element(&self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(MemoryNode {
            tag: tag.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            classes: Vec::new(),
        });
        NodeId(nodes.len() - 1)
    }

    /// Add `<img data-src=src>`.
    pub fn add_deferred_image(&self, src: &str) -> NodeId {
        self.add_element("img", &[("data-src", src)])
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INSPECTION
    // ═══════════════════════════════════════════════════════════════════════

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .borrow()
            .get(node.0)
            .map(|n| n.classes.clone())
            .unwrap_or_default()
    }

    /// Every host call recorded so far
    pub fn journal(&self) -> Vec<HostCall> {
        self.journal.borrow().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.borrow_mut().clear();
    }

    /// Elements appended to `<head>`, in order
    pub fn head_elements(&self) -> Vec<HeadElement> {
        self.head.borrow().iter().map(|e| e.element.clone()).collect()
    }

    /// Number of scripts and stylesheets appended for `url`. Preload hints are
    /// not counted.
    pub fn dispatch_count(&self, url: &str) -> usize {
        self.head
            .borrow()
            .iter()
            .filter(|e| !matches!(e.element, HeadElement::Preload { .. }))
            .filter(|e| e.element.url() == url)
            .count()
    }

    /// Number of appended scripts and stylesheets still waiting to settle
    pub fn pending_loads(&self) -> usize {
        self.head.borrow().iter().filter(|e| e.on_settle.is_some()).count()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event)
            .count()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Nodes currently registered with any live observer
    pub fn observed_nodes(&self) -> Vec<NodeId> {
        self.observers
            .borrow()
            .iter()
            .filter(|o| !o.disconnected.get())
            .flat_map(|o| o.observed.borrow().clone())
            .collect()
    }

    /// Options of every observer created so far
    pub fn observer_options(&self) -> Vec<ObserverOptions> {
        self.observers
            .borrow()
            .iter()
            .map(|o| o.options.clone())
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PLATFORM DRIVERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Finish the initial parse and fire ready callbacks.
    pub fn finish_parsing(&self) {
        self.ready_state.set(ReadyState::Interactive);
        let callbacks = std::mem::take(&mut *self.ready_callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    fn settle(&self, url: &str, outcome: &LoadOutcome) -> usize {
        let callbacks: Vec<SettleCallback> = self
            .head
            .borrow_mut()
            .iter_mut()
            .filter(|e| e.element.url() == url)
            .filter_map(|e| e.on_settle.take())
            .collect();
        let count = callbacks.len();
        for callback in callbacks {
            callback(outcome.clone());
        }
        count
    }

    /// Fire `load` on every pending script or stylesheet for `url`.
    /// Returns how many nodes settled.
    pub fn complete_load(&self, url: &str) -> usize {
        self.settle(url, &LoadOutcome::Loaded)
    }

    /// Fire `error` on every pending script or stylesheet for `url`.
    pub fn fail_load(&self, url: &str) -> usize {
        self.settle(url, &LoadOutcome::Failed(format!("network error fetching {}", url)))
    }

    /// Dispatch a document-level event. Returns how many listeners ran.
    pub fn dispatch_event(&self, event: &str) -> usize {
        let ids: Vec<usize> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event)
            .map(|l| l.id)
            .collect();

        let mut invoked = 0;
        for id in ids {
            let taken = {
                let mut listeners = self.listeners.borrow_mut();
                let Some(index) = listeners.iter().position(|l| l.id == id) else {
                    continue;
                };
                if listeners[index].options.once {
                    listeners.remove(index).handler
                } else {
                    listeners[index].handler.take()
                }
            };
            let Some(mut handler) = taken else {
                continue;
            };
            handler();
            invoked += 1;

            if let Some(listener) = self
                .listeners
                .borrow_mut()
                .iter_mut()
                .find(|l| l.id == id)
            {
                listener.handler = Some(handler);
            }
        }
        invoked
    }

    /// Move the clock forward, firing every timer that falls due in order.
    pub fn advance(&self, by: Duration) {
        let now = self.clock.get() + by;
        self.clock.set(now);
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let due = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= now)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(index, _)| index);
                due.map(|index| timers.remove(index))
            };
            match next {
                Some(timer) => (timer.handler)(),
                None => break,
            }
        }
    }

    /// Report `entries` to every live observer, limited to nodes it observes.
    pub fn report_intersections(&self, entries: &[IntersectionEntry<NodeId>]) {
        let observers: Vec<Rc<ObserverState>> = self.observers.borrow().clone();
        for state in observers {
            if state.disconnected.get() {
                continue;
            }
            let batch: Vec<IntersectionEntry<NodeId>> = entries
                .iter()
                .filter(|e| state.observed.borrow().contains(&e.target))
                .cloned()
                .collect();
            if batch.is_empty() {
                continue;
            }
            let Some(mut callback) = state.callback.borrow_mut().take() else {
                continue;
            };
            callback(batch, &MemoryObserver(Rc::clone(&state)));
            *state.callback.borrow_mut() = Some(callback);
        }
    }

    /// Bring `nodes` fully into the viewport.
    pub fn scroll_into_view(&self, nodes: &[NodeId]) {
        let entries: Vec<IntersectionEntry<NodeId>> = nodes
            .iter()
            .map(|node| IntersectionEntry {
                target: *node,
                is_intersecting: true,
                intersection_ratio: 1.0,
            })
            .collect();
        self.report_intersections(&entries);
    }
}

impl DocumentHost for MemoryDocument {
    type Node = NodeId;

    fn ready_state(&self) -> ReadyState {
        self.ready_state.get()
    }

    fn on_ready(&self, callback: OneShotHandler) {
        self.ready_callbacks.borrow_mut().push(callback);
    }

    fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        self.record(HostCall::Query(selector.to_string()));
        let selectors: Option<Vec<SimpleSelector>> =
            selector.split(',').map(SimpleSelector::parse).collect();
        let Some(selectors) = selectors else {
            debug!(selector, "Unsupported selector, matching nothing");
            return Vec::new();
        };
        self.nodes
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, node)| selectors.iter().any(|s| s.matches(node)))
            .map(|(index, _)| NodeId(index))
            .collect()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(node.0)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) {
        self.record(HostCall::SetAttribute {
            node: *node,
            name: name.to_string(),
            value: value.to_string(),
        });
        if let Some(n) = self.nodes.borrow_mut().get_mut(node.0) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) {
        self.record(HostCall::RemoveAttribute {
            node: *node,
            name: name.to_string(),
        });
        if let Some(n) = self.nodes.borrow_mut().get_mut(node.0) {
            n.attributes.remove(name);
        }
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.nodes
            .borrow()
            .get(node.0)
            .is_some_and(|n| n.classes.iter().any(|c| c == class))
    }

    fn add_class(&self, node: &NodeId, class: &str) {
        self.record(HostCall::AddClass {
            node: *node,
            class: class.to_string(),
        });
        if let Some(n) = self.nodes.borrow_mut().get_mut(node.0) {
            if !n.classes.iter().any(|c| c == class) {
                n.classes.push(class.to_string());
            }
        }
    }

    fn remove_class(&self, node: &NodeId, class: &str) {
        self.record(HostCall::RemoveClass {
            node: *node,
            class: class.to_string(),
        });
        if let Some(n) = self.nodes.borrow_mut().get_mut(node.0) {
            n.classes.retain(|c| c != class);
        }
    }

    fn append_to_head(
        &self,
        element: HeadElement,
        on_settle: Option<SettleCallback>,
    ) -> HostResult<()> {
        if !self.has_head {
            return Err(HostError::NoHead);
        }
        self.record(HostCall::AppendToHead(element.clone()));
        // Preload hints never report back
        let on_settle = match element {
            HeadElement::Preload { .. } => None,
            _ => on_settle,
        };
        self.head.borrow_mut().push(HeadEntry { element, on_settle });
        Ok(())
    }

    fn add_event_listener(&self, event: &str, options: ListenerOptions, handler: EventHandler) {
        self.record(HostCall::AddEventListener {
            event: event.to_string(),
            options,
        });
        let id = self.next_id();
        self.listeners.borrow_mut().push(Listener {
            id,
            event: event.to_string(),
            options,
            handler: Some(handler),
        });
    }

    fn set_timeout(&self, delay: Duration, handler: OneShotHandler) {
        self.record(HostCall::SetTimeout(delay));
        let id = self.next_id();
        self.timers.borrow_mut().push(Timer {
            id,
            due: self.clock.get() + delay,
            handler,
        });
    }

    fn create_intersection_observer(
        &self,
        options: &ObserverOptions,
        callback: IntersectionCallback<NodeId>,
    ) -> Option<Box<dyn IntersectionObserver<NodeId>>> {
        if !self.intersection_supported {
            return None;
        }
        self.record(HostCall::CreateObserver(options.clone()));
        let state = Rc::new(ObserverState {
            options: options.clone(),
            observed: RefCell::new(Vec::new()),
            callback: RefCell::new(Some(callback)),
            disconnected: Cell::new(false),
            journal: Rc::clone(&self.journal),
        });
        self.observers.borrow_mut().push(Rc::clone(&state));
        Some(Box::new(MemoryObserver(state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parsing() {
        assert_eq!(
            SimpleSelector::parse("img[data-src]"),
            Some(SimpleSelector {
                tag: Some("img".to_string()),
                attribute: Some("data-src".to_string()),
            })
        );
        assert_eq!(
            SimpleSelector::parse("[data-src]"),
            Some(SimpleSelector {
                tag: None,
                attribute: Some("data-src".to_string()),
            })
        );
        assert!(SimpleSelector::parse("img.lazy").is_none());
        assert!(SimpleSelector::parse("img[]").is_none());
        assert!(SimpleSelector::parse("").is_none());
    }

    #[test]
    fn test_query_selector_all() {
        let doc = MemoryDocument::new();
        let a = doc.add_deferred_image("/img/a.jpg");
        let _plain = doc.add_element("img", &[("src", "/img/b.jpg")]);
        let frame = doc.add_element("iframe", &[("data-src", "/embed")]);

        assert_eq!(doc.query_selector_all("img[data-src]"), vec![a]);
        assert_eq!(doc.query_selector_all("img[data-src], iframe[data-src]"), vec![a, frame]);
        assert!(doc.query_selector_all("img > span").is_empty());
    }

    #[test]
    fn test_once_listener_runs_once() {
        let doc = MemoryDocument::new();
        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        doc.add_event_listener(
            "click",
            ListenerOptions::once_passive(),
            Box::new(move || inner.set(inner.get() + 1)),
        );

        assert_eq!(doc.dispatch_event("click"), 1);
        assert_eq!(doc.dispatch_event("click"), 0);
        assert_eq!(count.get(), 1);
        assert_eq!(doc.listener_count("click"), 0);
    }

    #[test]
    fn test_persistent_listener_runs_every_time() {
        let doc = MemoryDocument::new();
        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        doc.add_event_listener(
            "scroll",
            ListenerOptions::default(),
            Box::new(move || inner.set(inner.get() + 1)),
        );

        doc.dispatch_event("scroll");
        doc.dispatch_event("scroll");
        assert_eq!(count.get(), 2);
        assert_eq!(doc.listener_count("scroll"), 1);
    }

    #[test]
    fn test_timers_fire_when_due() {
        let doc = MemoryDocument::new();
        let fired = Rc::new(Cell::new(false));
        let inner = Rc::clone(&fired);
        doc.set_timeout(Duration::from_millis(100), Box::new(move || inner.set(true)));

        doc.advance(Duration::from_millis(99));
        assert!(!fired.get());
        doc.advance(Duration::from_millis(1));
        assert!(fired.get());
        assert_eq!(doc.pending_timers(), 0);
    }

    #[test]
    fn test_append_without_head_fails() {
        let doc = MemoryDocument::new().without_head();
        let result = doc.append_to_head(
            HeadElement::Stylesheet {
                href: "/a.css".to_string(),
            },
            None,
        );
        assert!(matches!(result, Err(HostError::NoHead)));
        assert!(doc.head_elements().is_empty());
    }
}
