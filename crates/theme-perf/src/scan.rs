/*
 * scan.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Locates the built assets checked by the monitor.
 */

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::PerfError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Js,
    Css,
    Image,
}

impl AssetCategory {
    /// Report order
    pub const ALL: [AssetCategory; 3] = [
        AssetCategory::Js,
        AssetCategory::Css,
        AssetCategory::Image,
    ];

    /// Directory holding this category, relative to the site root
    pub fn directory(self) -> &'static Path {
        Path::new(match self {
            AssetCategory::Js => "static/js",
            AssetCategory::Css => "static/css",
            AssetCategory::Image => "assets/images",
        })
    }

    /// Tag printed in front of each file line
    pub fn label(self) -> &'static str {
        match self {
            AssetCategory::Js => "JS",
            AssetCategory::Css => "CSS",
            AssetCategory::Image => "IMG",
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            AssetCategory::Js => "JavaScript Files",
            AssetCategory::Css => "CSS Files",
            AssetCategory::Image => "Image Files",
        }
    }

    /// Whether a file name belongs to this category. Only minified bundles
    /// count for scripts and stylesheets; image extensions ignore case.
    pub fn matches(self, file_name: &str) -> bool {
        match self {
            AssetCategory::Js => file_name.ends_with(".min.js"),
            AssetCategory::Css => file_name.ends_with(".min.css"),
            AssetCategory::Image => Path::new(file_name)
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    IMAGE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                }),
        }
    }
}

/// A matching file and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub size: u64,
}

impl Asset {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Files of `category` directly inside its directory under `root`, sorted by
/// name. `None` when the directory does not exist.
pub fn scan_category(
    root: &Path,
    category: AssetCategory,
) -> Result<Option<Vec<Asset>>, PerfError> {
    let dir = root.join(category.directory());
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Skipping missing asset directory");
        return Ok(None);
    }

    let mut assets = Vec::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !category.matches(name) {
            continue;
        }
        let size = entry.metadata()?.len();
        debug!(file = name, size, "Found asset");
        assets.push(Asset {
            path: entry.into_path(),
            size,
        });
    }
    Ok(Some(assets))
}
