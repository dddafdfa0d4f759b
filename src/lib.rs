#![allow(clippy::collapsible_if)]

// Core modules
pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod models;
pub mod report;
pub mod utils;

// Re-export commonly used types
pub use config::{RunConfig, RunMode};
pub use data::{BNAPIVersion, CsvVersion, PriceSeriesProvider};
pub use domain::{Direction, Event, Symbol};
pub use engine::{StudyEngine, StudyOutput};
pub use error::EventStudyError;
pub use report::ReportRenderer;

// CLI argument parsing
use std::path::PathBuf;

use crate::analysis::ReturnKind;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Event study of crypto prices around curated market events", long_about = None)]
pub struct Cli {
    /// `default` reads the bundled event file, `batch` requires --events
    #[arg(long, value_enum, env = "RUN_MODE", default_value_t = RunMode::Default)]
    pub mode: RunMode,

    /// Custom event CSV (event_id,ts_utc,symbol,category,headline,source,direction)
    #[arg(long = "events", env = "EVENTS_CSV")]
    pub custom_event_path: Option<PathBuf>,

    /// Symbols to study, comma separated (e.g. BTC-USD,ETH-USD)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Use the market model against this benchmark instead of the flat baseline
    #[arg(long)]
    pub benchmark: Option<String>,

    /// Estimation window length in bars
    #[arg(long)]
    pub estimation: Option<usize>,

    /// Event window length in bars after the event bar
    #[arg(long)]
    pub window: Option<usize>,

    /// Days of price history to fetch
    #[arg(long)]
    pub lookback_days: Option<i64>,

    #[arg(long, value_enum, default_value_t = ReturnKind::Simple)]
    pub returns: ReturnKind,

    /// Skip the per-event CAR bootstrap
    #[arg(long, default_value_t = false)]
    pub no_bootstrap: bool,

    /// Read prices from <dir>/<SYMBOL>.csv instead of the Binance API
    #[arg(long)]
    pub prices_dir: Option<PathBuf>,

    /// Report output directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

/// Pick the price source for a run
pub fn make_provider(config: &RunConfig) -> Box<dyn PriceSeriesProvider> {
    match &config.prices_dir {
        Some(dir) => Box::new(CsvVersion::new(dir.clone())),
        None => Box::new(BNAPIVersion),
    }
}

/// Run the study and write the report. Nothing is written if the study fails.
pub async fn run_study(config: RunConfig) -> anyhow::Result<report::ReportPaths> {
    let provider = make_provider(&config);
    let renderer = ReportRenderer::new(config.out_dir.clone());
    let engine = StudyEngine::new(config, provider);
    let output = engine.run().await?;
    renderer.render(&output)
}
