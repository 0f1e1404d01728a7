/*
 * web.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * WebDocument: DocumentHost implementation over the browser DOM.
 *
 * Closures handed to the browser are leaked (`forget` / `once_into_js`):
 * listeners, timers and observers live for the whole page, and this module
 * has no teardown path.
 */

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use theme_loader::{
    DocumentHost, EventHandler, HeadElement, HostError, HostResult, IntersectionCallback,
    IntersectionEntry, IntersectionObserver, ListenerOptions, LoadOutcome, ObserverOptions,
    OneShotHandler, ReadyState, SettleCallback,
};
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Window};

/// Browser-side observer callback signature
type ObserverClosure = Closure<dyn FnMut(js_sys::Array, web_sys::IntersectionObserver)>;

fn js_error(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value))
}

/// The browser document of a window.
pub struct WebDocument {
    window: Window,
    document: Document,
}

impl WebDocument {
    pub fn new(window: Window) -> HostResult<Self> {
        let document = window
            .document()
            .ok_or_else(|| HostError::Dom("window has no document".to_string()))?;
        Ok(Self { window, document })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn supports_intersection_observer(&self) -> bool {
        js_sys::Reflect::has(&self.window, &JsValue::from_str("IntersectionObserver"))
            .unwrap_or(false)
    }
}

/// Wraps the JS observer. The instance created by the host owns the closure;
/// the one passed into callbacks only borrows the observer.
struct WebObserver {
    observer: web_sys::IntersectionObserver,
    _callback: Option<ObserverClosure>,
}

impl IntersectionObserver<Element> for WebObserver {
    fn observe(&self, node: &Element) {
        self.observer.observe(node);
    }

    fn unobserve(&self, node: &Element) {
        self.observer.unobserve(node);
    }

    fn disconnect(&self) {
        self.observer.disconnect();
    }
}

impl DocumentHost for WebDocument {
    type Node = Element;

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_dom(&self.document.ready_state())
    }

    fn on_ready(&self, callback: OneShotHandler) {
        let listener = Closure::once_into_js(move || callback());
        if let Err(error) = self
            .document
            .add_event_listener_with_callback("DOMContentLoaded", listener.unchecked_ref())
        {
            warn!(error = %js_error(&error), "Failed to wait for DOMContentLoaded");
        }
    }

    fn query_selector_all(&self, selector: &str) -> Vec<Element> {
        let list = match self.document.query_selector_all(selector) {
            Ok(list) => list,
            Err(error) => {
                warn!(selector, error = %js_error(&error), "Invalid selector");
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|index| list.get(index))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) {
        if let Err(error) = node.set_attribute(name, value) {
            warn!(name, error = %js_error(&error), "Failed to set attribute");
        }
    }

    fn remove_attribute(&self, node: &Element, name: &str) {
        if let Err(error) = node.remove_attribute(name) {
            warn!(name, error = %js_error(&error), "Failed to remove attribute");
        }
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn add_class(&self, node: &Element, class: &str) {
        if let Err(error) = node.class_list().add_1(class) {
            warn!(class, error = %js_error(&error), "Failed to add class");
        }
    }

    fn remove_class(&self, node: &Element, class: &str) {
        if let Err(error) = node.class_list().remove_1(class) {
            warn!(class, error = %js_error(&error), "Failed to remove class");
        }
    }

    fn append_to_head(
        &self,
        element: HeadElement,
        on_settle: Option<SettleCallback>,
    ) -> HostResult<()> {
        let head = self.document.head().ok_or(HostError::NoHead)?;
        let tag = element.tag_name();
        let node = self
            .document
            .create_element(tag)
            .map_err(|error| HostError::CreateElement {
                tag,
                message: js_error(&error),
            })?;
        for (name, value) in element.attributes() {
            node.set_attribute(name, value)
                .map_err(|error| HostError::Dom(js_error(&error)))?;
        }

        if let Some(on_settle) = on_settle {
            // load and error race for the same callback; whichever fires takes it
            let slot = Rc::new(RefCell::new(Some(on_settle)));

            let loaded = Rc::clone(&slot);
            let on_load = Closure::once_into_js(move || {
                if let Some(callback) = loaded.borrow_mut().take() {
                    callback(LoadOutcome::Loaded);
                }
            });

            let url = element.url().to_string();
            let on_error = Closure::once_into_js(move || {
                if let Some(callback) = slot.borrow_mut().take() {
                    callback(LoadOutcome::Failed(format!("error event for <{}> {}", tag, url)));
                }
            });

            node.add_event_listener_with_callback("load", on_load.unchecked_ref())
                .map_err(|error| HostError::Dom(js_error(&error)))?;
            node.add_event_listener_with_callback("error", on_error.unchecked_ref())
                .map_err(|error| HostError::Dom(js_error(&error)))?;
        }

        head.append_child(&node)
            .map_err(|error| HostError::Dom(js_error(&error)))?;
        Ok(())
    }

    fn add_event_listener(&self, event: &str, options: ListenerOptions, handler: EventHandler) {
        let closure = Closure::<dyn FnMut()>::wrap(handler);
        let js_options = web_sys::AddEventListenerOptions::new();
        js_options.set_once(options.once);
        js_options.set_passive(options.passive);

        match self
            .document
            .add_event_listener_with_callback_and_add_event_listener_options(
                event,
                closure.as_ref().unchecked_ref(),
                &js_options,
            ) {
            Ok(()) => closure.forget(),
            Err(error) => warn!(event, error = %js_error(&error), "Failed to add listener"),
        }
    }

    fn set_timeout(&self, delay: Duration, handler: OneShotHandler) {
        let callback = Closure::once_into_js(move || handler());
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        if let Err(error) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
        {
            warn!(error = %js_error(&error), "Failed to schedule timer");
        }
    }

    fn create_intersection_observer(
        &self,
        options: &ObserverOptions,
        mut callback: IntersectionCallback<Element>,
    ) -> Option<Box<dyn IntersectionObserver<Element>>> {
        if !self.supports_intersection_observer() {
            return None;
        }

        let closure: ObserverClosure = Closure::new(
            move |entries: js_sys::Array, observer: web_sys::IntersectionObserver| {
                let entries = entries
                    .iter()
                    .filter_map(|entry| entry.dyn_into::<web_sys::IntersectionObserverEntry>().ok())
                    .map(|entry| IntersectionEntry {
                        target: entry.target(),
                        is_intersecting: entry.is_intersecting(),
                        intersection_ratio: entry.intersection_ratio(),
                    })
                    .collect();
                let handle = WebObserver {
                    observer,
                    _callback: None,
                };
                callback(entries, &handle);
            },
        );

        let init = web_sys::IntersectionObserverInit::new();
        init.set_root_margin(&options.root_margin);
        init.set_threshold(&JsValue::from_f64(options.threshold));

        let callback: &js_sys::Function = closure.as_ref().unchecked_ref();
        let created = web_sys::IntersectionObserver::new_with_options(callback, &init);
        match created {
            Ok(observer) => Some(Box::new(WebObserver {
                observer,
                _callback: Some(closure),
            })),
            Err(error) => {
                warn!(error = %js_error(&error), "IntersectionObserver construction failed");
                None
            }
        }
    }
}
