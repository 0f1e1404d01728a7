//! theme-perf - Asset size monitor

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use theme_perf::{PerfConfig, Report};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "theme-perf")]
#[command(version, about = "Check built theme assets against size thresholds", long_about = None)]
struct Cli {
    /// Site root containing static/ and assets/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// TOML file overriding the [thresholds] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exit with an error when any file exceeds its threshold
    #[arg(long)]
    strict: bool,

    /// Log scanning details (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "theme_perf=warn",
        1 => "theme_perf=debug",
        _ => "theme_perf=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let start = Instant::now();
    let config = match &cli.config {
        Some(path) => PerfConfig::load(path)?,
        None => PerfConfig::default(),
    };
    info!(root = %cli.root.display(), thresholds = ?config.thresholds, "Checking assets");

    let report = Report::collect(&cli.root, &config)
        .with_context(|| format!("checking assets under {}", cli.root.display()))?;
    print!("{}", report.display(start.elapsed()));

    let warnings = report.warnings();
    if cli.strict && warnings > 0 {
        bail!("{} file(s) exceed their size threshold", warnings);
    }
    Ok(())
}
