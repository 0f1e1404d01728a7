/*
 * wasm-theme-loader
 * Copyright (c) 2025 Posit, PBC
 *
 * Browser entry point for the theme's progressive resource loader.
 * Starts the loader on module load and publishes `window.LazyLoader`.
 */

mod console;
mod web;

use std::cell::RefCell;
use std::rc::Rc;

use theme_loader::{CompletionCallback, LoaderConfig, ResourceLoader};
use tracing::{info, warn};
use wasm_bindgen::prelude::*;

pub use console::{ConsoleMakeWriter, init_logging};
pub use web::WebDocument;

/// Global name of the handle published on `window`
const GLOBAL_HANDLE: &str = "LazyLoader";

thread_local! {
    // The active loader. A replacement takes over the page state, so loads
    // in flight still settle; dropping the previous loader disconnects its
    // observer and leaves its listeners and timers inert.
    static ACTIVE: RefCell<Option<ResourceLoader<WebDocument>>> = const { RefCell::new(None) };
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn with_loader<R>(f: impl FnOnce(&ResourceLoader<WebDocument>) -> R) -> Option<R> {
    // Clone out of the slot so callbacks may call back into the handle
    let loader = ACTIVE.with(|slot| slot.borrow().clone());
    match loader {
        Some(loader) => Some(f(&loader)),
        None => {
            warn!("LazyLoader used before the module started");
            None
        }
    }
}

fn js_callback(callback: Option<js_sys::Function>) -> Option<CompletionCallback> {
    callback.map(|function| {
        Box::new(move || {
            if let Err(error) = function.call0(&JsValue::NULL) {
                warn!(?error, "Load callback threw");
            }
        }) as CompletionCallback
    })
}

/// Build a loader for `config`, make it the active one and start it. A page
/// that already has a loader keeps its dispatch history, so nothing is
/// fetched twice and startup hints are not repeated.
fn install(config: LoaderConfig) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| to_js("no global window"))?;
    let document = Rc::new(WebDocument::new(window.clone()).map_err(to_js)?);
    let page = ACTIVE.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|active| Rc::clone(active.page_state()))
    });
    let loader = match page {
        Some(page) => ResourceLoader::with_page_state(document, page, config),
        None => ResourceLoader::with_shared_host(document, config),
    }
    .map_err(to_js)?;
    info!(strategy = loader.strategy_name(), "Theme loader installed");

    let previous = ACTIVE.with(|slot| slot.borrow_mut().replace(loader.clone()));
    drop(previous);
    loader.init();

    js_sys::Reflect::set(
        &window,
        &JsValue::from_str(GLOBAL_HANDLE),
        &JsValue::from(LoaderHandle { _private: () }),
    )?;
    Ok(())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    init_logging(tracing::Level::INFO);

    install(LoaderConfig::default())
}

/// Replace the active loader with one built from a JSON configuration.
#[wasm_bindgen]
pub fn configure(config_json: &str) -> Result<(), JsValue> {
    let config = LoaderConfig::from_json(config_json).map_err(to_js)?;
    install(config)
}

/// Manual entry points into the active loader.
#[wasm_bindgen(js_name = LazyLoader)]
pub struct LoaderHandle {
    _private: (),
}

#[wasm_bindgen(js_class = LazyLoader)]
impl LoaderHandle {
    #[wasm_bindgen(js_name = loadElement)]
    pub fn load_element(&self, element: &web_sys::Element) {
        with_loader(|loader| loader.load_element(element));
    }

    /// Observe (or load) every deferred image; returns how many were found.
    #[wasm_bindgen(js_name = loadImages)]
    pub fn load_images(&self) -> u32 {
        with_loader(|loader| loader.observe_images())
            .map(|count| u32::try_from(count).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    #[wasm_bindgen(js_name = loadScript)]
    pub fn load_script(&self, src: &str, callback: Option<js_sys::Function>) {
        let callback = js_callback(callback);
        with_loader(|loader| loader.load_script(src, callback));
    }

    #[wasm_bindgen(js_name = loadStylesheet)]
    pub fn load_stylesheet(&self, href: &str, callback: Option<js_sys::Function>) {
        let callback = js_callback(callback);
        with_loader(|loader| loader.load_stylesheet(href, callback));
    }

    #[wasm_bindgen(js_name = preloadCritical)]
    pub fn preload_critical(&self) {
        with_loader(|loader| loader.preload_critical());
    }

    #[wasm_bindgen(js_name = loadFeaturesOnInteraction)]
    pub fn load_features_on_interaction(&self) {
        with_loader(|loader| loader.load_features_on_interaction());
    }

    pub fn run(&self) {
        with_loader(|loader| loader.run());
    }

    #[wasm_bindgen(getter)]
    pub fn strategy(&self) -> Option<String> {
        with_loader(|loader| loader.strategy_name().to_string())
    }

    #[wasm_bindgen(getter, js_name = featuresRequested)]
    pub fn features_requested(&self) -> bool {
        with_loader(|loader| loader.features_requested()).unwrap_or(false)
    }
}
