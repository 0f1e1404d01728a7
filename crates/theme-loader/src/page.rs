/*
 * page.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * PageState: dispatch bookkeeping that lives as long as the page.
 *
 * A loader rebuilt with a new configuration takes over the previous loader's
 * PageState, so dispatched URLs stay deduplicated, the feature bundle stays
 * gated, startup hints are not repeated and loads already in flight still
 * reach their callbacks.
 */

use std::cell::{Cell, RefCell};

use tracing::{debug, warn};

use crate::config::ReservationPolicy;
use crate::gate::InteractionGate;
use crate::host::LoadOutcome;
use crate::registry::{CompletionCallback, DispatchKind, ResourceRegistry};

/// Per-page state shared by every loader built for the same document.
#[derive(Debug)]
pub struct PageState {
    registry: RefCell<ResourceRegistry>,
    gate: InteractionGate,
    started: Cell<bool>,
}

impl PageState {
    pub fn new(policy: ReservationPolicy) -> Self {
        Self {
            registry: RefCell::new(ResourceRegistry::new(policy)),
            gate: InteractionGate::new(),
            started: Cell::new(false),
        }
    }

    /// Reservation policy fixed when the page state was created
    pub fn reservation(&self) -> ReservationPolicy {
        self.registry.borrow().policy()
    }

    pub fn is_loaded(&self, kind: DispatchKind, url: &str) -> bool {
        self.registry.borrow().is_loaded(kind, url)
    }

    /// Whether the feature bundle has been requested on this page
    pub fn features_requested(&self) -> bool {
        self.gate.has_fired()
    }

    /// Whether a loader has already run the startup sequence on this page
    pub fn has_started(&self) -> bool {
        self.started.get()
    }

    pub(crate) fn registry(&self) -> &RefCell<ResourceRegistry> {
        &self.registry
    }

    pub(crate) fn gate(&self) -> &InteractionGate {
        &self.gate
    }

    /// Returns `true` only for the first startup on this page.
    pub(crate) fn begin_startup(&self) -> bool {
        !self.started.replace(true)
    }

    pub(crate) fn settle(
        &self,
        kind: DispatchKind,
        url: &str,
        outcome: LoadOutcome,
        callback: Option<CompletionCallback>,
    ) {
        match outcome {
            LoadOutcome::Loaded => {
                let waiters = self.registry.borrow_mut().settle_success(kind, url);
                debug!(%kind, url, joined = waiters.len(), "Resource loaded");
                for callback in callback.into_iter().chain(waiters) {
                    callback();
                }
            }
            LoadOutcome::Failed(reason) => {
                let dropped = self.registry.borrow_mut().settle_failure(kind, url);
                warn!(%kind, url, %reason, dropped_callbacks = dropped, "Failed to load {}", kind);
            }
        }
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(ReservationPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_claimed_once() {
        let page = PageState::default();
        assert!(!page.has_started());
        assert!(page.begin_startup());
        assert!(!page.begin_startup());
        assert!(page.has_started());
    }

    #[test]
    fn test_reservation_reflects_construction() {
        assert_eq!(
            PageState::new(ReservationPolicy::OnSuccess).reservation(),
            ReservationPolicy::OnSuccess
        );
        assert_eq!(PageState::default().reservation(), ReservationPolicy::AtDispatch);
    }
}
