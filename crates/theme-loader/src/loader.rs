/*
 * loader.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * ResourceLoader: decides when deferred resources are fetched and reflects
 * load completion in the document.
 *
 * Everything is best effort. Missing capabilities degrade to eager loading,
 * failed fetches are logged and skipped, and nothing is reported back to page
 * scripts as an error.
 */

use std::rc::{Rc, Weak};

use tracing::{debug, info, trace, warn};

use crate::config::LoaderConfig;
use crate::element;
use crate::error::ConfigError;
use crate::host::{DocumentHost, HeadElement, ListenerOptions, ReadyState, SettleCallback};
use crate::page::PageState;
use crate::registry::{Admission, CompletionCallback, DispatchKind};
use crate::strategy::{self, VisibilityStrategy};

struct LoaderInner<H: DocumentHost + 'static> {
    host: Rc<H>,
    config: LoaderConfig,
    strategy: Box<dyn VisibilityStrategy<H>>,
    page: Rc<PageState>,
}

/// Progressive resource loader.
///
/// Cloning is cheap and yields another handle to the same loader; host
/// callbacks hold weak handles, so dropping the last clone makes every
/// pending listener, timer and observer callback inert. Dispatch bookkeeping
/// lives in a [`PageState`] that a replacement loader can take over.
pub struct ResourceLoader<H: DocumentHost + 'static> {
    inner: Rc<LoaderInner<H>>,
}

impl<H: DocumentHost + 'static> Clone for ResourceLoader<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: DocumentHost + 'static> ResourceLoader<H> {
    /// Build a loader, probing the host for intersection observation.
    pub fn new(host: H, config: LoaderConfig) -> Result<Self, ConfigError> {
        Self::with_shared_host(Rc::new(host), config)
    }

    /// Like [`ResourceLoader::new`], for a host the caller keeps a handle to.
    pub fn with_shared_host(host: Rc<H>, config: LoaderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let page = Rc::new(PageState::new(config.reservation));
        Ok(Self::build(host, page, config))
    }

    /// Build a loader that continues the page of an earlier loader.
    ///
    /// URLs that loader dispatched are not dispatched again, its pending
    /// loads still run their callbacks, and startup hints and the feature
    /// bundle are not repeated. The page keeps the reservation policy it was
    /// created with.
    pub fn with_page_state(
        host: Rc<H>,
        page: Rc<PageState>,
        config: LoaderConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.reservation != page.reservation() {
            warn!(
                requested = ?config.reservation,
                kept = ?page.reservation(),
                "Reservation policy is fixed per page, keeping the original"
            );
        }
        Ok(Self::build(host, page, config))
    }

    /// Build a loader with [`LoaderConfig::default()`].
    pub fn with_defaults(host: H) -> Self {
        let config = LoaderConfig::default();
        let page = Rc::new(PageState::new(config.reservation));
        Self::build(Rc::new(host), page, config)
    }

    fn build(host: Rc<H>, page: Rc<PageState>, config: LoaderConfig) -> Self {
        let strategy = strategy::select_strategy(&host, &config.observer_options());
        Self {
            inner: Rc::new(LoaderInner {
                host,
                config,
                strategy,
                page,
            }),
        }
    }

    fn from_weak(inner: &Weak<LoaderInner<H>>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Page state to hand to a replacement loader
    pub fn page_state(&self) -> &Rc<PageState> {
        &self.inner.page
    }

    /// Name of the visibility strategy chosen at construction
    pub fn strategy_name(&self) -> &'static str {
        self.inner.strategy.name()
    }

    /// Run [`ResourceLoader::run`] now, or once the document finishes parsing.
    pub fn init(&self) {
        match self.inner.host.ready_state() {
            ReadyState::Loading => {
                debug!("Document still parsing, deferring startup");
                let weak = Rc::downgrade(&self.inner);
                self.inner.host.on_ready(Box::new(move || {
                    if let Some(loader) = Self::from_weak(&weak) {
                        loader.run();
                    }
                }));
            }
            ReadyState::Interactive | ReadyState::Complete => self.run(),
        }
    }

    /// Startup sequence. Preload hints go out before image observation
    /// begins; interaction listeners are armed last.
    ///
    /// Preload hints are issued only by the first run on a page.
    pub fn run(&self) {
        if self.inner.page.begin_startup() {
            self.preload_critical();
        } else {
            debug!("Page already started, skipping preload hints");
        }
        self.observe_images();
        self.load_features_on_interaction();
    }

    /// Append a preload hint for every critical resource.
    pub fn preload_critical(&self) {
        for resource in &self.inner.config.critical_resources {
            let element = HeadElement::Preload {
                href: resource.href.clone(),
                kind: resource.kind,
            };
            if let Err(error) = self.inner.host.append_to_head(element, None) {
                warn!(href = %resource.href, %error, "Failed to add preload hint");
            }
        }
    }

    /// Hand every deferred image currently in the document to the visibility
    /// strategy. Returns how many nodes were found.
    pub fn observe_images(&self) -> usize {
        let host = self.inner.host.as_ref();
        let nodes = host.query_selector_all(&self.inner.config.image_selector);
        for node in &nodes {
            self.inner.strategy.watch(host, node);
        }
        debug!(
            count = nodes.len(),
            strategy = self.strategy_name(),
            "Deferred images registered"
        );
        nodes.len()
    }

    /// Promote the pending sources of `node` and mark it loaded.
    pub fn load_element(&self, node: &H::Node) {
        if !element::load_element(self.inner.host.as_ref(), node) {
            trace!(?node, "Nothing pending to promote");
        }
    }

    /// Append `<script async src=url>` unless the URL was already dispatched.
    ///
    /// `on_complete` runs after a successful load, or synchronously when the
    /// script loaded earlier. It never runs when the fetch fails.
    pub fn load_script(&self, url: &str, on_complete: Option<CompletionCallback>) {
        self.dispatch(DispatchKind::Script, url, on_complete);
    }

    /// Append `<link rel="stylesheet" href=url>` unless the URL was already
    /// dispatched. Callback semantics match [`ResourceLoader::load_script`].
    pub fn load_stylesheet(&self, url: &str, on_complete: Option<CompletionCallback>) {
        self.dispatch(DispatchKind::Stylesheet, url, on_complete);
    }

    pub fn is_script_loaded(&self, url: &str) -> bool {
        self.inner.page.is_loaded(DispatchKind::Script, url)
    }

    pub fn is_stylesheet_loaded(&self, url: &str) -> bool {
        self.inner.page.is_loaded(DispatchKind::Stylesheet, url)
    }

    fn dispatch(&self, kind: DispatchKind, url: &str, on_complete: Option<CompletionCallback>) {
        let admission = self.inner.page.registry().borrow_mut().admit(kind, url, on_complete);
        match admission {
            Admission::Loaded(callback) => {
                trace!(%kind, url, "Already loaded");
                if let Some(callback) = callback {
                    callback();
                }
            }
            Admission::Joined => {
                debug!(%kind, url, "Load already in flight, waiting on it");
            }
            Admission::Dispatch(callback) => {
                let element = match kind {
                    DispatchKind::Script => HeadElement::Script {
                        src: url.to_string(),
                        is_async: true,
                    },
                    DispatchKind::Stylesheet => HeadElement::Stylesheet {
                        href: url.to_string(),
                    },
                };

                // Settlement belongs to the page, so it outlives this loader
                let page = Rc::downgrade(&self.inner.page);
                let owned_url = url.to_string();
                let on_settle: SettleCallback = Box::new(move |outcome| {
                    if let Some(page) = page.upgrade() {
                        page.settle(kind, &owned_url, outcome, callback);
                    }
                });

                if let Err(error) = self.inner.host.append_to_head(element, Some(on_settle)) {
                    self.inner.page.registry().borrow_mut().settle_failure(kind, url);
                    warn!(%kind, url, %error, "Failed to dispatch {}", kind);
                }
            }
        }
    }

    /// Arm the feature bundle: whichever comes first of a qualifying
    /// interaction or the fallback timer loads it, exactly once per page.
    pub fn load_features_on_interaction(&self) {
        if self.inner.page.features_requested() {
            debug!("Feature bundle already requested on this page");
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let trigger: Rc<dyn Fn(&str)> = Rc::new(move |source: &str| {
            let Some(loader) = Self::from_weak(&weak) else {
                return;
            };
            if !loader.inner.page.gate().try_fire() {
                return;
            }
            info!(trigger = source, "Loading feature bundle");
            let url = loader.inner.config.features_url.clone();
            loader.load_script(&url, Some(Box::new(|| info!("Features loaded"))));
        });

        let host = self.inner.host.as_ref();
        for event in &self.inner.config.interaction_events {
            let trigger = Rc::clone(&trigger);
            let source = event.clone();
            host.add_event_listener(
                event,
                ListenerOptions::once_passive(),
                Box::new(move || trigger(&source)),
            );
        }

        host.set_timeout(
            self.inner.config.fallback_delay(),
            Box::new(move || trigger("timeout")),
        );
    }

    /// Whether the feature bundle has been requested
    pub fn features_requested(&self) -> bool {
        self.inner.page.features_requested()
    }
}
