/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Size thresholds, optionally overridden from a TOML file:
 *
 * ```toml
 * [thresholds]
 * js = 250000
 * css = 150000
 * image = 500000
 * ```
 */

use std::path::Path;

use serde::Deserialize;

use crate::error::PerfError;
use crate::scan::AssetCategory;

/// Maximum recommended size, in bytes, per asset category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub js: u64,
    pub css: u64,
    pub image: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            js: 250000,
            css: 150000,
            image: 500000,
        }
    }
}

impl Thresholds {
    pub fn for_category(&self, category: AssetCategory) -> u64 {
        match category {
            AssetCategory::Js => self.js,
            AssetCategory::Css => self.css,
            AssetCategory::Image => self.image,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerfConfig {
    pub thresholds: Thresholds,
}

impl PerfConfig {
    /// Read a config file. Keys it omits keep their defaults.
    pub fn load(path: &Path) -> Result<Self, PerfError> {
        let text = std::fs::read_to_string(path).map_err(|source| PerfError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| PerfError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PerfConfig::default();
        assert_eq!(config.thresholds.js, 250000);
        assert_eq!(config.thresholds.css, 150000);
        assert_eq!(config.thresholds.image, 500000);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("perf.toml");
        fs::write(&path, "[thresholds]\njs = 100000\n").unwrap();

        let config = PerfConfig::load(&path).unwrap();
        assert_eq!(config.thresholds.js, 100000);
        assert_eq!(config.thresholds.css, 150000);
        assert_eq!(config.thresholds.for_category(AssetCategory::Image), 500000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("perf.toml");
        fs::write(&path, "[thresholds]\nfonts = 1\n").unwrap();

        let err = PerfConfig::load(&path).unwrap_err();
        assert!(matches!(err, PerfError::ParseConfig { .. }));
    }

    #[test]
    fn test_missing_file_reported() {
        let err = PerfConfig::load(Path::new("/nonexistent/perf.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/perf.toml"));
    }
}
