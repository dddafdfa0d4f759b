use anyhow::{Context, Result};
use clap::Parser;

use event_sniper::{Cli, RunConfig, run_study};

fn main() -> Result<()> {
    // A. Init Logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // B. Parse Args
    let args = Cli::parse();
    #[cfg(debug_assertions)]
    log::info!("Parsed arguments: {:?}", args);

    let config = RunConfig::from_cli(&args).context("invalid configuration")?;
    log::info!(
        "🚀 Event study starting ({} mode, {} symbols, events from {})",
        config.mode,
        config.symbols.len(),
        config.events_path.display()
    );

    // C. Run (prices are fetched one symbol at a time)
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create Tokio runtime")?;
    let paths = rt.block_on(run_study(config))?;

    log::info!("✅ Done: {}", paths.html.display());
    Ok(())
}
