/*
 * element.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Deferred-source promotion and visual state of loadable elements.
 */

use crate::host::DocumentHost;

/// Pending primary source
pub const PENDING_SRC: &str = "data-src";
/// Pending responsive source set
pub const PENDING_SRCSET: &str = "data-srcset";
pub const ACTIVE_SRC: &str = "src";
pub const ACTIVE_SRCSET: &str = "srcset";

/// Class applied while an element waits for visibility
pub const LAZY_CLASS: &str = "lazy";
/// Class applied once the deferred source has been promoted
pub const LOADED_CLASS: &str = "loaded";

/// Visual state of a loadable element.
///
/// Transitions are monotonic: `Pending → Loading → Loaded`. An element loaded
/// eagerly skips `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadState {
    /// Untouched markup
    Pending,
    /// Marked `lazy` and registered for visibility
    Loading,
    /// Carries the `loaded` class
    Loaded,
}

/// Read the visual state of `node` from its classes.
pub fn load_state<H: DocumentHost + ?Sized>(host: &H, node: &H::Node) -> LoadState {
    if host.has_class(node, LOADED_CLASS) {
        LoadState::Loaded
    } else if host.has_class(node, LAZY_CLASS) {
        LoadState::Loading
    } else {
        LoadState::Pending
    }
}

/// Promote pending sources to active ones and mark the node loaded.
///
/// Returns whether any attribute was promoted. A second call on the same node
/// promotes nothing and only reapplies the classes.
pub fn load_element<H: DocumentHost + ?Sized>(host: &H, node: &H::Node) -> bool {
    let promoted_src = promote(host, node, PENDING_SRC, ACTIVE_SRC);
    let promoted_srcset = promote(host, node, PENDING_SRCSET, ACTIVE_SRCSET);

    host.remove_class(node, LAZY_CLASS);
    host.add_class(node, LOADED_CLASS);

    promoted_src || promoted_srcset
}

fn promote<H: DocumentHost + ?Sized>(
    host: &H,
    node: &H::Node,
    pending: &str,
    active: &str,
) -> bool {
    // An empty pending value is treated as absent
    match host.attribute(node, pending) {
        Some(value) if !value.is_empty() => {
            host.set_attribute(node, active, &value);
            host.remove_attribute(node, pending);
            tracing::trace!(?node, attribute = active, %value, "Promoted deferred source");
            true
        }
        _ => false,
    }
}
