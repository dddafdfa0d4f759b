//! Per-run configuration, built once in `main` from the CLI and handed to the engine.

use std::path::PathBuf;

use chrono::Duration;
use itertools::Itertools;
use strum_macros::Display;

use crate::Cli;
use crate::analysis::{AggregateSettings, BootstrapSettings, NormalReturnModel, ReturnKind, WindowSpec};
use crate::config::{ANALYSIS, PERSISTENCE};
use crate::domain::Symbol;
use crate::error::{EventStudyError, Result};

/// Where events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum RunMode {
    /// Bundled default event file
    #[default]
    #[value(alias = "interactive")]
    Default,
    /// Caller-supplied event file (required)
    Batch,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    pub events_path: PathBuf,
    pub symbols: Vec<Symbol>,
    pub windows: WindowSpec,
    pub return_kind: ReturnKind,
    pub model: NormalReturnModel,
    pub bootstrap: Option<BootstrapSettings>,
    pub aggregate: AggregateSettings,
    pub lookback: Duration,
    /// Read prices from `<dir>/<SYMBOL>.csv` instead of Binance
    pub prices_dir: Option<PathBuf>,
    pub out_dir: PathBuf,
}

impl RunConfig {
    pub fn from_cli(args: &Cli) -> Result<Self> {
        let events_path = resolve_events_path(args.mode, args.custom_event_path.as_ref())?;

        let interval_ms = ANALYSIS.interval_width_ms;
        let mut symbols: Vec<Symbol> = args
            .symbols
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Symbol::new(s, interval_ms))
            .collect();
        if symbols.is_empty() {
            symbols = ANALYSIS
                .default_symbols
                .iter()
                .map(|s| Symbol::new(s, interval_ms))
                .collect();
        }
        // First occurrence wins
        let symbols: Vec<Symbol> = symbols.into_iter().unique().collect();

        let windows = WindowSpec {
            estimation: bounded_periods(
                "estimation",
                args.estimation
                    .unwrap_or(ANALYSIS.windows.estimation_periods),
            )?,
            event: bounded_periods(
                "window",
                args.window.unwrap_or(ANALYSIS.windows.event_periods),
            )?,
        };

        let lookback_days = args.lookback_days.unwrap_or(ANALYSIS.lookback_days);
        if lookback_days <= 0 || lookback_days > ANALYSIS.max_lookback_days {
            return Err(EventStudyError::Config(format!(
                "lookback must be between 1 and {} days, got {}",
                ANALYSIS.max_lookback_days, lookback_days
            )));
        }

        let model = match &args.benchmark {
            Some(benchmark) => NormalReturnModel::MarketModel {
                benchmark: Symbol::new(benchmark, interval_ms).name,
                min_observations: ANALYSIS.market_model.min_observations,
            },
            None => NormalReturnModel::MeanAdjusted,
        };

        let bootstrap = (ANALYSIS.bootstrap.enabled && !args.no_bootstrap).then_some(
            BootstrapSettings {
                iterations: ANALYSIS.bootstrap.iterations,
                seed: ANALYSIS.bootstrap.seed,
                min_window_len: ANALYSIS.bootstrap.min_window_len,
                min_extra_samples: ANALYSIS.bootstrap.min_extra_samples,
            },
        );

        Ok(Self {
            mode: args.mode,
            events_path,
            symbols,
            windows,
            return_kind: args.returns,
            model,
            bootstrap,
            aggregate: AggregateSettings {
                window_len: windows.window_len(),
                min_events_for_ci: ANALYSIS.aggregate.min_events_for_ci,
            },
            lookback: Duration::days(lookback_days),
            prices_dir: args.prices_dir.clone(),
            out_dir: args
                .out_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(PERSISTENCE.report_dir)),
        })
    }

    /// Benchmark symbol when the market model is selected
    pub fn benchmark(&self) -> Option<Symbol> {
        match &self.model {
            NormalReturnModel::MarketModel { benchmark, .. } => {
                Some(Symbol::new(benchmark, ANALYSIS.interval_width_ms))
            }
            NormalReturnModel::MeanAdjusted => None,
        }
    }
}

fn bounded_periods(name: &str, periods: usize) -> Result<usize> {
    if periods > ANALYSIS.windows.max_periods {
        return Err(EventStudyError::Config(format!(
            "--{} must be at most {} bars, got {}",
            name, ANALYSIS.windows.max_periods, periods
        )));
    }
    Ok(periods)
}

fn resolve_events_path(mode: RunMode, custom: Option<&PathBuf>) -> Result<PathBuf> {
    match (mode, custom) {
        (RunMode::Batch, Some(path)) => Ok(path.clone()),
        (RunMode::Batch, None) => Err(EventStudyError::Config(
            "batch mode needs a custom event file (--events or EVENTS_CSV)".to_string(),
        )),
        (RunMode::Default, Some(path)) => {
            log::warn!(
                "Ignoring custom event file {} in default mode; using {}",
                path.display(),
                PERSISTENCE.default_events_csv
            );
            Ok(PathBuf::from(PERSISTENCE.default_events_csv))
        }
        (RunMode::Default, None) => Ok(PathBuf::from(PERSISTENCE.default_events_csv)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["event-sniper"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_mode_uses_default_events() {
        let config = RunConfig::from_cli(&parse(&["--mode", "default"])).unwrap();
        assert_eq!(config.events_path, PathBuf::from(PERSISTENCE.default_events_csv));
        assert_eq!(config.symbols.len(), ANALYSIS.default_symbols.len());
        assert_eq!(config.model, NormalReturnModel::MeanAdjusted);
        assert_eq!(config.aggregate.window_len, ANALYSIS.windows.event_periods + 1);
    }

    #[test]
    fn test_batch_mode_requires_custom_path() {
        let err = RunConfig::from_cli(&parse(&["--mode", "batch"])).unwrap_err();
        assert!(matches!(err, EventStudyError::Config(_)));

        let config =
            RunConfig::from_cli(&parse(&["--mode", "batch", "--events", "my/events.csv"])).unwrap();
        assert_eq!(config.events_path, PathBuf::from("my/events.csv"));
        assert_eq!(config.mode, RunMode::Batch);
    }

    #[test]
    fn test_custom_path_ignored_in_default_mode() {
        let config =
            RunConfig::from_cli(&parse(&["--mode", "interactive", "--events", "x.csv"])).unwrap();
        assert_eq!(config.mode, RunMode::Default);
        assert_eq!(config.events_path, PathBuf::from(PERSISTENCE.default_events_csv));
    }

    #[test]
    fn test_overrides() {
        let config = RunConfig::from_cli(&parse(&[
            "--mode",
            "default",
            "--symbols",
            "btc-usd,eth-usd",
            "--benchmark",
            "btc-usd",
            "--estimation",
            "48",
            "--window",
            "6",
            "--returns",
            "log",
            "--no-bootstrap",
        ]))
        .unwrap();
        assert_eq!(config.symbols.len(), 2);
        assert_eq!(config.symbols[0].name, "BTC-USD");
        assert_eq!(config.windows, WindowSpec { estimation: 48, event: 6 });
        assert_eq!(config.return_kind, ReturnKind::Log);
        assert!(config.bootstrap.is_none());
        assert_eq!(config.benchmark().map(|s| s.name), Some("BTC-USD".to_string()));
    }

    #[test]
    fn test_rejects_non_positive_lookback() {
        let err = RunConfig::from_cli(&parse(&["--mode", "default", "--lookback-days", "0"]));
        assert!(matches!(err, Err(EventStudyError::Config(_))));
    }

    #[test]
    fn test_rejects_huge_lookback() {
        let max = i64::MAX.to_string();
        let err = RunConfig::from_cli(&parse(&["--lookback-days", &max]));
        assert!(matches!(err, Err(EventStudyError::Config(_))));

        let limit = ANALYSIS.max_lookback_days.to_string();
        let config = RunConfig::from_cli(&parse(&["--lookback-days", &limit])).unwrap();
        assert_eq!(config.lookback, Duration::days(ANALYSIS.max_lookback_days));
    }

    #[test]
    fn test_rejects_huge_windows() {
        let max = usize::MAX.to_string();
        let err = RunConfig::from_cli(&parse(&["--window", &max]));
        assert!(matches!(err, Err(EventStudyError::Config(_))));

        let err = RunConfig::from_cli(&parse(&["--estimation", &max]));
        assert!(matches!(err, Err(EventStudyError::Config(_))));
    }

    #[test]
    fn test_repeated_symbols_collapse() {
        let config = RunConfig::from_cli(&parse(&[
            "--symbols",
            "btc-usd,eth-usd,btc-usd,eth-usd",
        ]))
        .unwrap();
        let names: Vec<&str> = config.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["BTC-USD", "ETH-USD"]);
    }
}
