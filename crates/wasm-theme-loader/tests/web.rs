//! Browser tests for WebDocument. Run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use theme_loader::{DocumentHost, LoadState, ResourceLoader, load_state};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use wasm_theme_loader::WebDocument;
use web_sys::Element;

wasm_bindgen_test_configure!(run_in_browser);

fn deferred_image(src: &str) -> Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let img = document.create_element("img").unwrap();
    img.set_attribute("data-src", src).unwrap();
    document
        .document_element()
        .unwrap()
        .append_child(&img)
        .unwrap();
    img
}

fn web_loader() -> ResourceLoader<WebDocument> {
    ResourceLoader::with_defaults(WebDocument::new(web_sys::window().unwrap()).unwrap())
}

fn published_handle() -> JsValue {
    let window = web_sys::window().unwrap();
    js_sys::Reflect::get(&window, &JsValue::from_str("LazyLoader")).unwrap()
}

fn handle_method(handle: &JsValue, name: &str) -> js_sys::Function {
    js_sys::Reflect::get(handle, &JsValue::from_str(name))
        .unwrap()
        .dyn_into::<js_sys::Function>()
        .unwrap()
}

fn count_matching(selector: &str) -> u32 {
    let document = web_sys::window().unwrap().document().unwrap();
    document.query_selector_all(selector).unwrap().length()
}

async fn sleep(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

#[wasm_bindgen_test]
fn test_browser_has_intersection_observer() {
    assert_eq!(web_loader().strategy_name(), "intersection-observer");
}

#[wasm_bindgen_test]
fn test_load_element_promotes_source() {
    let loader = web_loader();
    let img = deferred_image("/img/promote.jpg");

    loader.load_element(&img);

    assert_eq!(img.get_attribute("src").as_deref(), Some("/img/promote.jpg"));
    assert_eq!(img.get_attribute("data-src"), None);
    assert!(img.class_list().contains("loaded"));
    assert_eq!(load_state(loader.host(), &img), LoadState::Loaded);
}

#[wasm_bindgen_test]
fn test_observe_marks_images_lazy() {
    let loader = web_loader();
    let img = deferred_image("/img/observe.jpg");

    assert!(loader.observe_images() >= 1);
    assert!(loader.host().has_class(&img, "lazy"));
}

#[wasm_bindgen_test]
fn test_stylesheet_appended_once() {
    let loader = web_loader();
    let href = "/static/css/web-test.css";

    loader.load_stylesheet(href, None);
    loader.load_stylesheet(href, None);

    let links = loader
        .host()
        .query_selector_all("link[href=\"/static/css/web-test.css\"]");
    assert_eq!(links.len(), 1);
    assert_eq!(
        links[0].get_attribute("rel").as_deref(),
        Some("stylesheet")
    );
}

#[wasm_bindgen_test]
fn test_start_publishes_handle() {
    wasm_theme_loader::start().unwrap();

    let handle = published_handle();
    assert!(handle.is_object());
    for name in [
        "loadElement",
        "loadImages",
        "loadScript",
        "loadStylesheet",
        "preloadCritical",
        "loadFeaturesOnInteraction",
        "run",
    ] {
        assert!(
            js_sys::Reflect::get(&handle, &JsValue::from_str(name))
                .unwrap()
                .is_function(),
            "LazyLoader.{name} is callable"
        );
    }
    let strategy = js_sys::Reflect::get(&handle, &JsValue::from_str("strategy")).unwrap();
    assert_eq!(strategy.as_string().as_deref(), Some("intersection-observer"));
}

#[wasm_bindgen_test]
fn test_handle_methods_reach_active_loader() {
    wasm_theme_loader::start().unwrap();
    let handle = published_handle();
    let href = "/static/css/handle-test.css";
    let selector = "link[href=\"/static/css/handle-test.css\"]";

    let load_stylesheet = handle_method(&handle, "loadStylesheet");
    load_stylesheet.call1(&handle, &JsValue::from_str(href)).unwrap();
    load_stylesheet.call1(&handle, &JsValue::from_str(href)).unwrap();
    assert_eq!(count_matching(selector), 1);

    let img = deferred_image("/img/handle.jpg");
    handle_method(&handle, "loadElement").call1(&handle, &img).unwrap();
    assert_eq!(img.get_attribute("src").as_deref(), Some("/img/handle.jpg"));

    let found = handle_method(&handle, "loadImages").call0(&handle).unwrap();
    assert!(found.as_f64().is_some());
}

#[wasm_bindgen_test]
fn test_configure_accepts_json_and_republishes_handle() {
    wasm_theme_loader::configure(r#"{ "fallback_delay_ms": 500 }"#).unwrap();

    let handle = published_handle();
    assert!(handle.is_object());
    assert!(js_sys::Reflect::get(&handle, &JsValue::from_str("loadImages"))
        .unwrap()
        .is_function());
}

#[wasm_bindgen_test]
fn test_configure_rejects_invalid_json() {
    assert!(wasm_theme_loader::configure("{not json").is_err());
    assert!(wasm_theme_loader::configure(r#"{ "threshold": 2.0 }"#).is_err());
}

#[wasm_bindgen_test]
fn test_reconfigure_keeps_page_history() {
    wasm_theme_loader::start().unwrap();
    let preloads = "link[rel=\"preload\"][href=\"/static/css/critical.min.css\"]";
    let script = "script[src=\"/static/js/reconfigure-test.min.js\"]";
    let before = count_matching(preloads);

    let handle = published_handle();
    handle_method(&handle, "loadScript")
        .call1(&handle, &JsValue::from_str("/static/js/reconfigure-test.min.js"))
        .unwrap();
    wasm_theme_loader::configure("{}").unwrap();
    let handle = published_handle();
    handle_method(&handle, "loadScript")
        .call1(&handle, &JsValue::from_str("/static/js/reconfigure-test.min.js"))
        .unwrap();

    assert_eq!(count_matching(preloads), before, "preload hints are not repeated");
    assert_eq!(count_matching(script), 1, "script is dispatched once per page");
}

#[wasm_bindgen_test]
async fn test_observer_loads_visible_image() {
    let loader = web_loader();
    let img = deferred_image("/img/visible.jpg");
    img.set_attribute("style", "display:block;width:10px;height:10px")
        .unwrap();

    loader.observe_images();
    sleep(200).await;

    assert_eq!(img.get_attribute("src").as_deref(), Some("/img/visible.jpg"));
    assert!(img.class_list().contains("loaded"));
    assert!(!img.class_list().contains("lazy"));
}
