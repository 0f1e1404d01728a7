//! Loader configuration.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Every option has a default matching the theme's stock markup, so an empty
//! JSON object (or [`LoaderConfig::default()`]) yields a working loader:
//!
//! ```json
//! {
//!   "root_margin": { "vertical_px": 50, "horizontal_px": 0 },
//!   "threshold": 0.01,
//!   "features_url": "/static/js/features.min.js",
//!   "fallback_delay_ms": 3000,
//!   "reservation": "at-dispatch"
//! }
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::host::{ObserverOptions, ResourceKind};

/// Pre-fetch margin around the viewport, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootMargin {
    pub vertical_px: i32,
    pub horizontal_px: i32,
}

impl Default for RootMargin {
    fn default() -> Self {
        Self {
            vertical_px: 50,
            horizontal_px: 0,
        }
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px {}px", self.vertical_px, self.horizontal_px)
    }
}

/// A resource hinted for early fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalResource {
    pub href: String,
    #[serde(rename = "as")]
    pub kind: ResourceKind,
}

impl CriticalResource {
    pub fn new(href: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            href: href.into(),
            kind,
        }
    }
}

/// When a script or stylesheet URL counts as dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationPolicy {
    /// Reserve the URL as soon as its node is appended. Concurrent callers
    /// join the in-flight load instead of issuing a second request.
    #[default]
    AtDispatch,
    /// Record the URL only once it has loaded. A second call made while the
    /// first is in flight issues its own request.
    OnSuccess,
}

/// Configuration for [`ResourceLoader`](crate::ResourceLoader).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Distance outside the viewport at which images start loading
    pub root_margin: RootMargin,

    /// Minimal visible ratio that triggers a load. Never exactly zero, so
    /// offscreen zero-area nodes do not fire spuriously.
    pub threshold: f64,

    /// Selector for deferred images
    pub image_selector: String,

    /// Bundle of non-critical features loaded after first interaction
    pub features_url: String,

    /// Delay after which the feature bundle loads without interaction
    pub fallback_delay_ms: u64,

    /// Document events that count as a first interaction
    pub interaction_events: Vec<String>,

    /// Resources hinted with `<link rel="preload">` at startup
    pub critical_resources: Vec<CriticalResource>,

    pub reservation: ReservationPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root_margin: RootMargin::default(),
            threshold: 0.01,
            image_selector: "img[data-src]".to_string(),
            features_url: "/static/js/features.min.js".to_string(),
            fallback_delay_ms: 3000,
            interaction_events: ["click", "scroll", "keydown", "touchstart"]
                .into_iter()
                .map(String::from)
                .collect(),
            critical_resources: vec![
                CriticalResource::new("/static/css/critical.min.css", ResourceKind::Style),
                CriticalResource::new("/static/js/core.min.js", ResourceKind::Script),
            ],
            reservation: ReservationPolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Parse and validate a JSON configuration. Missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LoaderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::Threshold(self.threshold));
        }
        if self.image_selector.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "image_selector",
            });
        }
        if self.features_url.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "features_url",
            });
        }
        if self.critical_resources.iter().any(|r| r.href.trim().is_empty()) {
            return Err(ConfigError::Empty {
                field: "critical_resources.href",
            });
        }
        Ok(())
    }

    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            root_margin: self.root_margin.to_string(),
            threshold: self.threshold,
        }
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }
}
