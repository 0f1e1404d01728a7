/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading the monitor configuration or walking asset directories.
#[derive(Debug, Error)]
pub enum PerfError {
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to scan assets: {0}")]
    Walk(#[from] walkdir::Error),
}
