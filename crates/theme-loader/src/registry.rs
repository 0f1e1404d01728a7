/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * At-most-once dispatch tracking for scripts and stylesheets.
 */

use std::collections::HashMap;
use std::fmt;

use crate::config::ReservationPolicy;

/// Caller-supplied completion callback for a script or stylesheet load
pub type CompletionCallback = Box<dyn FnOnce()>;

/// The two resource families the registry tracks separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    Script,
    Stylesheet,
}

impl fmt::Display for DispatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchKind::Script => f.write_str("script"),
            DispatchKind::Stylesheet => f.write_str("stylesheet"),
        }
    }
}

enum Entry {
    /// Node appended, fetch pending. Holds callbacks of callers that joined.
    InFlight(Vec<CompletionCallback>),
    Loaded,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::InFlight(waiters) => write!(f, "InFlight({} waiters)", waiters.len()),
            Entry::Loaded => f.write_str("Loaded"),
        }
    }
}

/// What the caller of [`ResourceRegistry::admit`] must do next.
pub enum Admission {
    /// Already loaded. Run the callback now; do not touch the network.
    Loaded(Option<CompletionCallback>),
    /// A load for this URL is in flight and the callback was queued behind it.
    Joined,
    /// Append a node. The callback belongs to this dispatch.
    Dispatch(Option<CompletionCallback>),
}

impl fmt::Debug for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Admission::Loaded(_) => f.write_str("Loaded"),
            Admission::Joined => f.write_str("Joined"),
            Admission::Dispatch(_) => f.write_str("Dispatch"),
        }
    }
}

/// Dispatched script and stylesheet URLs.
///
/// Callbacks are handed back to the caller rather than invoked here, so the
/// registry is never borrowed while user code runs.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    policy: ReservationPolicy,
    scripts: HashMap<String, Entry>,
    stylesheets: HashMap<String, Entry>,
}

impl ResourceRegistry {
    pub fn new(policy: ReservationPolicy) -> Self {
        Self {
            policy,
            scripts: HashMap::new(),
            stylesheets: HashMap::new(),
        }
    }

    pub fn policy(&self) -> ReservationPolicy {
        self.policy
    }

    fn entries(&mut self, kind: DispatchKind) -> &mut HashMap<String, Entry> {
        match kind {
            DispatchKind::Script => &mut self.scripts,
            DispatchKind::Stylesheet => &mut self.stylesheets,
        }
    }

    /// Decide whether a request for `url` goes to the network.
    pub fn admit(
        &mut self,
        kind: DispatchKind,
        url: &str,
        callback: Option<CompletionCallback>,
    ) -> Admission {
        let policy = self.policy;
        let entries = self.entries(kind);
        match entries.get_mut(url) {
            Some(Entry::Loaded) => Admission::Loaded(callback),
            Some(Entry::InFlight(waiters)) => {
                waiters.extend(callback);
                Admission::Joined
            }
            None => {
                if policy == ReservationPolicy::AtDispatch {
                    entries.insert(url.to_string(), Entry::InFlight(Vec::new()));
                }
                Admission::Dispatch(callback)
            }
        }
    }

    /// Record a successful load and return the callbacks queued behind it.
    pub fn settle_success(&mut self, kind: DispatchKind, url: &str) -> Vec<CompletionCallback> {
        match self.entries(kind).insert(url.to_string(), Entry::Loaded) {
            Some(Entry::InFlight(waiters)) => waiters,
            _ => Vec::new(),
        }
    }

    /// Release a failed reservation so a later call may retry.
    ///
    /// Returns the number of queued callbacks that were dropped. A URL that
    /// already loaded through another dispatch stays loaded.
    pub fn settle_failure(&mut self, kind: DispatchKind, url: &str) -> usize {
        let entries = self.entries(kind);
        match entries.get(url) {
            Some(Entry::InFlight(_)) => match entries.remove(url) {
                Some(Entry::InFlight(waiters)) => waiters.len(),
                _ => 0,
            },
            _ => 0,
        }
    }

    pub fn is_loaded(&self, kind: DispatchKind, url: &str) -> bool {
        let entries = match kind {
            DispatchKind::Script => &self.scripts,
            DispatchKind::Stylesheet => &self.stylesheets,
        };
        matches!(entries.get(url), Some(Entry::Loaded))
    }

    #[cfg(test)]
    fn is_in_flight(&self, kind: DispatchKind, url: &str) -> bool {
        let entries = match kind {
            DispatchKind::Script => &self.scripts,
            DispatchKind::Stylesheet => &self.stylesheets,
        };
        matches!(entries.get(url), Some(Entry::InFlight(_)))
    }
}
