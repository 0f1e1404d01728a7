//! Integration tests for the interaction-gated feature bundle.

use std::time::Duration;

use theme_loader::memory::{HostCall, MemoryDocument};
use theme_loader::{ListenerOptions, LoaderConfig, ResourceLoader};

const FEATURES: &str = "/static/js/features.min.js";

#[test]
fn test_listeners_are_once_and_passive() {
    let loader = ResourceLoader::with_defaults(MemoryDocument::new());
    loader.load_features_on_interaction();

    let registered: Vec<(String, ListenerOptions)> = loader
        .host()
        .journal()
        .into_iter()
        .filter_map(|call| match call {
            HostCall::AddEventListener { event, options } => Some((event, options)),
            _ => None,
        })
        .collect();

    let events: Vec<&str> = registered.iter().map(|(e, _)| e.as_str()).collect();
    assert_eq!(events, vec!["click", "scroll", "keydown", "touchstart"]);
    assert!(
        registered
            .iter()
            .all(|(_, options)| *options == ListenerOptions::once_passive())
    );
    assert!(
        loader
            .host()
            .journal()
            .contains(&HostCall::SetTimeout(Duration::from_millis(3000)))
    );
}

#[test]
fn test_first_interaction_loads_bundle() {
    let loader = ResourceLoader::with_defaults(MemoryDocument::new());
    let doc = loader.host();
    loader.load_features_on_interaction();

    assert!(!loader.features_requested());
    assert_eq!(doc.dispatch_count(FEATURES), 0);

    doc.dispatch_event("keydown");
    assert!(loader.features_requested());
    assert_eq!(doc.dispatch_count(FEATURES), 1);
}

#[test]
fn test_interaction_then_timeout_loads_once() {
    let loader = ResourceLoader::with_defaults(MemoryDocument::new());
    let doc = loader.host();
    loader.load_features_on_interaction();

    doc.dispatch_event("click");
    doc.advance(Duration::from_millis(3000));

    assert_eq!(doc.dispatch_count(FEATURES), 1);
    assert_eq!(doc.pending_timers(), 0);
}

#[test]
fn test_every_trigger_after_the_first_is_inert() {
    let loader = ResourceLoader::with_defaults(MemoryDocument::new());
    let doc = loader.host();
    loader.load_features_on_interaction();

    doc.dispatch_event("scroll");
    doc.complete_load(FEATURES);
    for event in ["click", "keydown", "touchstart", "scroll"] {
        doc.dispatch_event(event);
    }
    doc.advance(Duration::from_secs(10));

    assert_eq!(doc.dispatch_count(FEATURES), 1);
    assert!(loader.is_script_loaded(FEATURES));
}

#[test]
fn test_timeout_loads_without_interaction() {
    let loader = ResourceLoader::with_defaults(MemoryDocument::new());
    let doc = loader.host();
    loader.load_features_on_interaction();

    doc.advance(Duration::from_millis(2999));
    assert_eq!(doc.dispatch_count(FEATURES), 0);

    doc.advance(Duration::from_millis(1));
    assert_eq!(doc.dispatch_count(FEATURES), 1);

    doc.dispatch_event("touchstart");
    assert_eq!(doc.dispatch_count(FEATURES), 1);
}

#[test]
fn test_unrelated_events_do_not_trigger() {
    let loader = ResourceLoader::with_defaults(MemoryDocument::new());
    let doc = loader.host();
    loader.load_features_on_interaction();

    doc.dispatch_event("mousemove");
    doc.dispatch_event("resize");
    assert!(!loader.features_requested());
}

#[test]
fn test_custom_bundle_and_delay() {
    let config = LoaderConfig::from_json(
        r#"{
            "features_url": "/static/js/search.min.js",
            "fallback_delay_ms": 250,
            "interaction_events": ["pointerdown"]
        }"#,
    )
    .unwrap();
    let loader = ResourceLoader::new(MemoryDocument::new(), config).unwrap();
    let doc = loader.host();
    loader.load_features_on_interaction();

    assert_eq!(doc.listener_count("click"), 0);
    assert_eq!(doc.listener_count("pointerdown"), 1);

    doc.advance(Duration::from_millis(250));
    assert_eq!(doc.dispatch_count("/static/js/search.min.js"), 1);
}

#[test]
fn test_bundle_already_loaded_is_not_refetched() {
    let loader = ResourceLoader::with_defaults(MemoryDocument::new());
    let doc = loader.host();

    loader.load_script(FEATURES, None);
    doc.complete_load(FEATURES);

    loader.load_features_on_interaction();
    doc.dispatch_event("click");

    assert!(loader.features_requested());
    assert_eq!(doc.dispatch_count(FEATURES), 1);
}
