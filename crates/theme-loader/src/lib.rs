/*
 * theme-loader
 * Copyright (c) 2025 Posit, PBC
 *
 * Progressive resource loader for the site theme.
 *
 * Defers non-critical images, scripts and stylesheets:
 * - Images carrying `data-src` / `data-srcset` load when they approach the
 *   viewport, or immediately when the host cannot observe intersections
 * - Scripts and stylesheets are dispatched at most once per page
 * - Critical resources are hinted with `<link rel="preload">` at startup
 * - The feature bundle loads after the first user interaction or a timeout
 *
 * The loader drives a DocumentHost, so the same code runs in the browser
 * (wasm-theme-loader) and against the in-memory MemoryDocument.
 */

mod config;
mod element;
mod error;
mod gate;
mod host;
mod loader;
pub mod memory;
mod page;
mod registry;
mod strategy;

pub use config::{CriticalResource, LoaderConfig, ReservationPolicy, RootMargin};
pub use element::{
    ACTIVE_SRC, ACTIVE_SRCSET, LAZY_CLASS, LOADED_CLASS, LoadState, PENDING_SRC, PENDING_SRCSET,
    load_state,
};
pub use error::{ConfigError, HostError, HostResult};
pub use gate::InteractionGate;
pub use host::{
    DocumentHost, EventHandler, HeadElement, IntersectionCallback, IntersectionEntry,
    IntersectionObserver, ListenerOptions, LoadOutcome, ObserverOptions, OneShotHandler,
    ReadyState, ResourceKind, SettleCallback,
};
pub use loader::ResourceLoader;
pub use page::PageState;
pub use registry::{CompletionCallback, DispatchKind};
pub use strategy::{EagerStrategy, ObserverStrategy, VisibilityStrategy};

#[cfg(test)]
mod tests {
    use super::*;
    use memory::MemoryDocument;

    #[test]
    fn test_strategy_follows_capability() {
        let observed = ResourceLoader::with_defaults(MemoryDocument::new());
        assert_eq!(observed.strategy_name(), "intersection-observer");

        let eager =
            ResourceLoader::with_defaults(MemoryDocument::new().without_intersection_observer());
        assert_eq!(eager.strategy_name(), "eager");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = LoaderConfig {
            threshold: 0.0,
            ..LoaderConfig::default()
        };
        assert!(matches!(
            ResourceLoader::new(MemoryDocument::new(), config),
            Err(ConfigError::Threshold(_))
        ));
    }
}
