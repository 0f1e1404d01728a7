/*
 * strategy.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Visibility strategies for deferred images.
 *
 * The strategy is picked once, when the loader is built:
 * - ObserverStrategy: the host supports intersection observation, so nodes
 *   are marked lazy and loaded when they approach the viewport
 * - EagerStrategy: no observer, every node is loaded on the spot
 */

use std::rc::{Rc, Weak};

use tracing::debug;

use crate::element::{self, LAZY_CLASS};
use crate::host::{DocumentHost, IntersectionCallback, IntersectionObserver, ObserverOptions};

/// Decides what happens to a deferred image found at startup.
pub trait VisibilityStrategy<H: DocumentHost> {
    /// Short name for diagnostics
    fn name(&self) -> &'static str;

    /// Take charge of `node`: either register it or load it right away.
    fn watch(&self, host: &H, node: &H::Node);
}

/// Loads nodes when the host reports them intersecting the viewport.
pub struct ObserverStrategy<N> {
    observer: Box<dyn IntersectionObserver<N>>,
}

impl<N> ObserverStrategy<N> {
    pub fn new(observer: Box<dyn IntersectionObserver<N>>) -> Self {
        Self { observer }
    }
}

impl<H: DocumentHost> VisibilityStrategy<H> for ObserverStrategy<H::Node> {
    fn name(&self) -> &'static str {
        "intersection-observer"
    }

    fn watch(&self, host: &H, node: &H::Node) {
        host.add_class(node, LAZY_CLASS);
        self.observer.observe(node);
    }
}

impl<N> Drop for ObserverStrategy<N> {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Loads every node immediately. Used when the host cannot observe intersections.
#[derive(Debug, Default, Clone, Copy)]
pub struct EagerStrategy;

impl<H: DocumentHost> VisibilityStrategy<H> for EagerStrategy {
    fn name(&self) -> &'static str {
        "eager"
    }

    fn watch(&self, host: &H, node: &H::Node) {
        element::load_element(host, node);
    }
}

/// Build the observer callback: load each intersecting node once, then stop
/// observing it.
///
/// A batch may report the same node more than once; only its first
/// intersecting entry counts. The callback holds the host weakly; once the
/// loader is gone it does nothing.
fn intersection_callback<H: DocumentHost + 'static>(
    host: Weak<H>,
) -> IntersectionCallback<H::Node> {
    Box::new(move |entries, observer| {
        let Some(host) = host.upgrade() else {
            return;
        };
        let mut handled: Vec<H::Node> = Vec::new();
        for entry in entries.into_iter().filter(|entry| entry.is_intersecting) {
            if handled.contains(&entry.target) {
                continue;
            }
            element::load_element(host.as_ref(), &entry.target);
            observer.unobserve(&entry.target);
            handled.push(entry.target);
        }
    })
}

/// Check whether the host supports intersection observation and pick a strategy.
pub fn select_strategy<H: DocumentHost + 'static>(
    host: &Rc<H>,
    options: &ObserverOptions,
) -> Box<dyn VisibilityStrategy<H>> {
    match host.create_intersection_observer(options, intersection_callback(Rc::downgrade(host))) {
        Some(observer) => {
            debug!(
                root_margin = %options.root_margin,
                threshold = options.threshold,
                "Using intersection observer for deferred images"
            );
            Box::new(ObserverStrategy::new(observer))
        }
        None => {
            debug!("Intersection observation unavailable, loading deferred images eagerly");
            Box::new(EagerStrategy)
        }
    }
}
