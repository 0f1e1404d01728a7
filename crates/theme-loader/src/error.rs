//! Error types for the resource loader.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Nothing here ever reaches page scripts as an exception. `ConfigError` is
//! returned when a loader is built; `HostError` is logged and absorbed at the
//! call site that produced it.

use thiserror::Error;

/// Errors raised while building or validating a [`LoaderConfig`](crate::LoaderConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON handed over by the page could not be parsed
    #[error("Invalid loader configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Visibility threshold outside `(0, 1]`
    #[error("Visibility threshold must be greater than 0 and at most 1, got {0}")]
    Threshold(f64),

    /// A required string option was empty
    #[error("Configuration option `{field}` must not be empty")]
    Empty { field: &'static str },
}

/// Errors reported by a [`DocumentHost`](crate::DocumentHost) implementation.
#[derive(Debug, Error)]
pub enum HostError {
    /// The document has no `<head>` to append resource nodes to
    #[error("Document has no <head> element")]
    NoHead,

    /// The host refused to create a node
    #[error("Failed to create <{tag}> element: {message}")]
    CreateElement { tag: &'static str, message: String },

    /// Any other DOM operation failure
    #[error("DOM operation failed: {0}")]
    Dom(String),
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;
