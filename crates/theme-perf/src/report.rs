/*
 * report.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Size checks and the plain-text monitoring report.
 */

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::config::PerfConfig;
use crate::error::PerfError;
use crate::scan::{AssetCategory, scan_category};

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const RULE: &str = "================================";

/// Human-readable size in base-1024 units with at most two decimals and no
/// trailing zeros: `1536` is `1.5 KB`, `0` is `0 Bytes`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut scale = 1u64;
    while unit + 1 < UNITS.len() && bytes / scale >= 1024 {
        scale *= 1024;
        unit += 1;
    }
    let fixed = format!("{:.2}", bytes as f64 / scale as f64);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warn,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::Warn => "WARN",
        })
    }
}

/// One file measured against its category threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCheck {
    pub category: AssetCategory,
    pub name: String,
    pub size: u64,
    pub threshold: u64,
}

impl FileCheck {
    /// Strictly larger than the threshold warns; equal is fine.
    pub fn status(&self) -> Status {
        if self.size > self.threshold {
            Status::Warn
        } else {
            Status::Ok
        }
    }
}

/// Checks for one category whose directory exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub category: AssetCategory,
    pub files: Vec<FileCheck>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub sections: Vec<Section>,
}

impl Report {
    /// Measure every asset category under `root`. Missing directories are
    /// left out of the report.
    pub fn collect(root: &Path, config: &PerfConfig) -> Result<Self, PerfError> {
        let mut sections = Vec::new();
        for category in AssetCategory::ALL {
            let Some(assets) = scan_category(root, category)? else {
                continue;
            };
            let threshold = config.thresholds.for_category(category);
            let files = assets
                .iter()
                .map(|asset| FileCheck {
                    category,
                    name: asset.file_name(),
                    size: asset.size,
                    threshold,
                })
                .collect::<Vec<_>>();
            for check in files.iter().filter(|c| c.status() == Status::Warn) {
                warn!(
                    file = %check.name,
                    size = check.size,
                    threshold = check.threshold,
                    "Asset exceeds size threshold"
                );
            }
            sections.push(Section { category, files });
        }
        Ok(Self { sections })
    }

    pub fn files(&self) -> impl Iterator<Item = &FileCheck> {
        self.sections.iter().flat_map(|section| section.files.iter())
    }

    pub fn total_files(&self) -> usize {
        self.files().count()
    }

    pub fn warnings(&self) -> usize {
        self.files().filter(|c| c.status() == Status::Warn).count()
    }

    pub fn total_size(&self) -> u64 {
        self.files().map(|c| c.size).sum()
    }

    /// The printable report. `elapsed` is the time the check took.
    pub fn display(&self, elapsed: Duration) -> ReportDisplay<'_> {
        ReportDisplay {
            report: self,
            elapsed,
        }
    }
}

pub struct ReportDisplay<'a> {
    report: &'a Report,
    elapsed: Duration,
}

impl fmt::Display for ReportDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Performance Monitoring Report")?;
        writeln!(f, "{}", RULE)?;

        for section in &self.report.sections {
            writeln!(f)?;
            writeln!(f, "{}:", section.category.heading())?;
            for check in &section.files {
                writeln!(
                    f,
                    "[{}] {}: {} - {}",
                    check.status(),
                    check.category.label(),
                    check.name,
                    format_bytes(check.size)
                )?;
                if check.status() == Status::Warn {
                    writeln!(
                        f,
                        ">> File exceeds recommended size threshold of {}",
                        format_bytes(check.threshold)
                    )?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Total files checked: {}", self.report.total_files())?;
        writeln!(f, "Files with warnings: {}", self.report.warnings())?;
        writeln!(f, "Total size: {}", format_bytes(self.report.total_size()))?;
        writeln!(f, "Build completed in: {}ms", self.elapsed.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1023), "1023 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(150000), "146.48 KB");
        assert_eq!(format_bytes(250000), "244.14 KB");
        assert_eq!(format_bytes(500000), "488.28 KB");
        assert_eq!(format_bytes(1048576), "1 MB");
    }

    #[test]
    fn test_format_bytes_caps_at_gigabytes() {
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[test]
    fn test_status_threshold_is_exclusive() {
        let check = |size| FileCheck {
            category: AssetCategory::Css,
            name: "main.min.css".to_string(),
            size,
            threshold: 150000,
        };
        assert_eq!(check(150000).status(), Status::Ok);
        assert_eq!(check(150001).status(), Status::Warn);
    }

    #[test]
    fn test_empty_report_totals() {
        let report = Report::default();
        let text = report.display(Duration::from_millis(3)).to_string();
        assert!(text.contains("Total files checked: 0"));
        assert!(text.contains("Total size: 0 Bytes"));
        assert!(text.ends_with("Build completed in: 3ms\n"));
    }
}
