/*
 * theme-perf
 * Copyright (c) 2025 Posit, PBC
 *
 * Asset size monitor for the theme's build output.
 *
 * Checks the `.min.js` files under `static/js`, the `.min.css` files under
 * `static/css` and the images under `assets/images` against per-category
 * byte thresholds and renders a plain-text report.
 */

pub mod config;
pub mod error;
pub mod report;
pub mod scan;

pub use config::{PerfConfig, Thresholds};
pub use error::PerfError;
pub use report::{FileCheck, Report, Section, Status, format_bytes};
pub use scan::{Asset, AssetCategory, scan_category};
