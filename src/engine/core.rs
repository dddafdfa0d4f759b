use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use itertools::Itertools;
use tokio::time::Instant;

use crate::analysis::{
    AggregateFilter, EventStudy, NormalReturnModel, aggregate, stats, to_returns,
};
#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
use crate::config::{ANALYSIS, RunConfig};
use crate::data::{EventTable, PriceSeriesProvider, fetch_price_collection, load_events_csv};
use crate::domain::{Event, Symbol};
use crate::models::{AggregateResult, EventWindowResult, ReturnSeries};
use crate::utils::TimeUtils;

use super::state::{MethodNotes, RunSummary, StudyOutput, SymbolRanking};

/// Runs one event study end to end: events -> prices -> AR/CAR -> aggregates.
///
/// Symbols are processed one after another. A symbol that cannot be fetched,
/// or an event the series does not cover, is recorded in the run summary and
/// skipped. Only an empty overall aggregate fails the run.
pub struct StudyEngine {
    config: RunConfig,
    provider: Box<dyn PriceSeriesProvider>,
}

impl StudyEngine {
    pub fn new(config: RunConfig, provider: Box<dyn PriceSeriesProvider>) -> Self {
        Self { config, provider }
    }

    /// Load the configured event file and run the study over it.
    pub async fn run(&self) -> Result<StudyOutput> {
        let table = load_events_csv(&self.config.events_path).with_context(|| {
            format!(
                "failed to load events from {}",
                self.config.events_path.display()
            )
        })?;
        self.run_with_events(table).await
    }

    pub async fn run_with_events(&self, table: EventTable) -> Result<StudyOutput> {
        let start_time = Instant::now();
        let mut summary = RunSummary {
            provider: self.provider.signature().to_string(),
            events_loaded: table.events.len(),
            rejected_rows: table.rejected.clone(),
            ..RunSummary::default()
        };

        // Events outside the study universe are skipped in file order
        let in_universe = |symbol: &str| self.config.symbols.iter().any(|s| s.name == symbol);
        let (studied, outside): (Vec<Event>, Vec<Event>) = table
            .events
            .iter()
            .cloned()
            .partition(|e| in_universe(&e.symbol));
        for event in &outside {
            summary.skip_event(event, format!("{} is not in the symbol list", event.symbol));
        }
        let by_symbol: HashMap<String, Vec<Event>> =
            studied.into_iter().into_group_map_by(|e| e.symbol.clone());

        let mut to_fetch: Vec<Symbol> = Vec::new();
        for symbol in &self.config.symbols {
            if by_symbol.contains_key(&symbol.name) {
                to_fetch.push(symbol.clone());
            } else {
                summary.skip_symbol(&symbol.name, "no events");
            }
        }
        let benchmark = self.config.benchmark();
        if let Some(bench) = &benchmark {
            if !to_fetch.contains(bench) {
                to_fetch.push(bench.clone());
            }
        }

        let collection =
            fetch_price_collection(self.provider.as_ref(), &to_fetch, self.config.lookback).await;
        for (symbol, err) in &collection.failures {
            if by_symbol.contains_key(symbol) {
                summary.skip_symbol(symbol, err.to_string());
            }
        }

        let bench_returns = self.benchmark_returns(benchmark.as_ref(), &collection.series);
        let mean_adjusted = NormalReturnModel::MeanAdjusted;

        let mut results: Vec<EventWindowResult> = Vec::new();
        for symbol in &to_fetch {
            let Some(events) = by_symbol.get(&symbol.name) else {
                continue; // benchmark only
            };
            let Some(series) = collection.get(&symbol.name) else {
                continue; // fetch failure, already recorded
            };
            let returns = match to_returns(series, self.config.return_kind) {
                Ok(r) => r,
                Err(e) => {
                    summary.skip_symbol(&symbol.name, e.to_string());
                    continue;
                }
            };

            // The benchmark is never regressed on itself
            let is_benchmark = benchmark.as_ref() == Some(symbol);
            let (model, bench) = match (&bench_returns, is_benchmark) {
                (Some(b), false) => (&self.config.model, Some(b)),
                _ => (&mean_adjusted, None),
            };
            let study = EventStudy {
                spec: self.config.windows,
                model,
                bootstrap: self.config.bootstrap.as_ref(),
            };

            let before = results.len();
            for event in events {
                match study.evaluate(event, &returns, bench) {
                    Ok(result) => {
                        #[cfg(debug_assertions)]
                        if DEBUG_FLAGS.print_event_windows {
                            log::info!(
                                "{} {}: baseline {:.6}, final CAR {:.4}",
                                result.symbol,
                                result.event_id,
                                result.baseline,
                                result.final_car().unwrap_or(f64::NAN)
                            );
                        }
                        results.push(result);
                    }
                    Err(e) => summary.skip_event(event, e.to_string()),
                }
            }
            log::info!(
                "{}: {} of {} events evaluated",
                symbol,
                results.len() - before,
                events.len()
            );
        }

        let overall = aggregate(&results, &AggregateFilter::all(), &self.config.aggregate)
            .context("event study produced no eligible events")?;

        let by_symbol_aggs = self.aggregates_by(&results, |r| r.symbol.clone(), AggregateFilter::by_symbol);
        let by_category_aggs =
            self.aggregates_by(&results, |r| r.category.clone(), AggregateFilter::by_category);
        let ranking = rank_symbols(&by_symbol_aggs, &results);

        log::info!(
            "Study finished in {:?}: {} events evaluated, {} skipped, {} symbols skipped",
            start_time.elapsed(),
            results.len(),
            summary.skipped_events.len(),
            summary.skipped_symbols.len()
        );

        Ok(StudyOutput {
            method: MethodNotes {
                windows: self.config.windows,
                return_kind: self.config.return_kind,
                model: self.config.model.clone(),
                bootstrap_iterations: self.config.bootstrap.map(|b| b.iterations),
                interval: TimeUtils::interval_to_string(ANALYSIS.interval_width_ms).to_string(),
            },
            events: table.events,
            results,
            overall,
            by_symbol: by_symbol_aggs,
            by_category: by_category_aggs,
            ranking,
            summary,
            prices: collection.series,
        })
    }

    /// Benchmark returns under the market model; None (mean-adjusted for every
    /// symbol) when the benchmark could not be fetched.
    fn benchmark_returns(
        &self,
        benchmark: Option<&Symbol>,
        series: &BTreeMap<String, crate::models::PriceSeries>,
    ) -> Option<ReturnSeries> {
        let bench = benchmark?;
        let returns = series
            .get(&bench.name)
            .and_then(|s| to_returns(s, self.config.return_kind).ok());
        if returns.is_none() {
            log::warn!(
                "⚠️  Benchmark {} unavailable, falling back to the mean-adjusted model",
                bench
            );
        }
        returns
    }

    fn aggregates_by<K, F>(
        &self,
        results: &[EventWindowResult],
        key: K,
        filter: F,
    ) -> Vec<AggregateResult>
    where
        K: Fn(&EventWindowResult) -> String,
        F: Fn(&str) -> AggregateFilter,
    {
        results
            .iter()
            .map(key)
            .unique()
            .sorted()
            .filter_map(|k| match aggregate(results, &filter(&k), &self.config.aggregate) {
                Ok(agg) => Some(agg),
                Err(e) => {
                    log::warn!("⚠️  No aggregate for {}: {}", k, e);
                    None
                }
            })
            .collect()
    }
}

/// Symbols ordered by final mean CAR, largest first.
pub fn rank_symbols(
    by_symbol: &[AggregateResult],
    results: &[EventWindowResult],
) -> Vec<SymbolRanking> {
    by_symbol
        .iter()
        .filter_map(|agg| {
            let final_mean_car = agg.final_mean_car()?;
            let final_cars: Vec<f64> = results
                .iter()
                .filter(|r| agg.event_ids.contains(&r.event_id))
                .filter_map(|r| r.final_car())
                .collect();
            Some(SymbolRanking {
                symbol: agg.label.clone(),
                n_events: agg.n_events(),
                final_mean_car,
                final_car_std: stats::sample_std_dev(&final_cars),
                car_ci: agg.car_ci,
                small_sample: agg.n_events() < ANALYSIS.aggregate.small_sample_threshold,
            })
        })
        .sorted_by(|a, b| b.final_mean_car.total_cmp(&a.final_mean_car))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AggregateSettings, ReturnKind, WindowSpec};
    use crate::config::RunMode;
    use crate::data::load_events_from_reader;
    use crate::error::EventStudyError;
    use crate::models::PriceSeries;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::path::PathBuf;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// 200 hourly bars with a gentle deterministic wiggle and a 5% jump at hour 120.
    struct SyntheticProvider;

    #[async_trait]
    impl PriceSeriesProvider for SyntheticProvider {
        async fn fetch_price_series(
            &self,
            symbol: &Symbol,
            _lookback: Duration,
        ) -> crate::error::Result<PriceSeries> {
            if symbol.name == "DEAD-USD" {
                return Err(EventStudyError::price_fetch(&symbol.name, "delisted"));
            }
            let mut price = 100.0;
            let points = (0..200)
                .map(|h| {
                    let wiggle = ((h * 7 % 5) as f64 - 2.0) * 1e-4;
                    price *= 1.0 + wiggle + if h == 120 { 0.05 } else { 0.0 };
                    (start() + Duration::hours(h), price)
                })
                .collect();
            PriceSeries::new(symbol.clone(), points)
        }

        fn signature(&self) -> &'static str {
            "Synthetic"
        }
    }

    fn market_config(symbols: &[&str], benchmark: &str) -> RunConfig {
        RunConfig {
            model: NormalReturnModel::MarketModel {
                benchmark: benchmark.to_string(),
                min_observations: 10,
            },
            ..config(symbols)
        }
    }

    fn config(symbols: &[&str]) -> RunConfig {
        let windows = WindowSpec {
            estimation: 48,
            event: 12,
        };
        RunConfig {
            mode: RunMode::Default,
            events_path: PathBuf::from("unused.csv"),
            symbols: symbols
                .iter()
                .map(|s| Symbol::new(s, TimeUtils::MS_IN_H))
                .collect(),
            windows,
            return_kind: ReturnKind::Simple,
            model: NormalReturnModel::MeanAdjusted,
            bootstrap: None,
            aggregate: AggregateSettings {
                window_len: windows.window_len(),
                min_events_for_ci: 5,
            },
            lookback: Duration::days(30),
            prices_dir: None,
            out_dir: PathBuf::from("unused"),
        }
    }

    fn events() -> EventTable {
        load_events_from_reader(
            "event_id,ts_utc,symbol,category,headline,source,direction\n\
             J1,2024-01-06T00:00:00Z,BTC-USD,Listing,jump,test,pos\n\
             J2,2024-01-06T00:00:00Z,ETH-USD,Listing,jump,test,pos\n\
             EARLY,2024-01-01T05:00:00Z,BTC-USD,Hack,too early,test,neg\n\
             D1,2024-01-06T00:00:00Z,DEAD-USD,Hack,no prices,test,neg\n\
             X1,2024-01-06T00:00:00Z,XRP-USD,Hack,not studied,test,neg\n"
                .as_bytes(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_skips_failures_and_keeps_going() {
        let engine = StudyEngine::new(
            config(&["BTC-USD", "ETH-USD", "DEAD-USD", "SOL-USD"]),
            Box::new(SyntheticProvider),
        );
        let output = engine.run_with_events(events()).await.unwrap();

        let ids: Vec<&str> = output.results.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["J1", "J2"]);
        assert_eq!(output.overall.n_events(), 2);

        let skipped_events: Vec<&str> = output
            .summary
            .skipped_events
            .iter()
            .map(|s| s.event_id.as_str())
            .sorted()
            .collect();
        assert_eq!(skipped_events, vec!["EARLY", "X1"]);

        let skipped_symbols: Vec<&str> = output
            .summary
            .skipped_symbols
            .iter()
            .map(|s| s.symbol.as_str())
            .sorted()
            .collect();
        assert_eq!(skipped_symbols, vec!["DEAD-USD", "SOL-USD"]);

        assert_eq!(output.by_symbol.len(), 2);
        assert_eq!(output.by_category.len(), 1);
        assert_eq!(output.ranking.len(), 2);
        assert!(output.ranking.iter().all(|r| r.small_sample));
    }

    #[tokio::test]
    async fn test_jump_shows_up_in_final_car() {
        let engine = StudyEngine::new(config(&["BTC-USD"]), Box::new(SyntheticProvider));
        let output = engine.run_with_events(events()).await.unwrap();
        let j1 = output.results.iter().find(|r| r.event_id == "J1").unwrap();
        // jump is 5%, noise per bar is at most 2e-4
        assert!(j1.final_car().unwrap() > 0.05 - 13.0 * 5e-4);
    }

    #[tokio::test]
    async fn test_no_eligible_events_fails_the_run() {
        let engine = StudyEngine::new(config(&["DEAD-USD"]), Box::new(SyntheticProvider));
        let err = engine.run_with_events(events()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EventStudyError>(),
            Some(EventStudyError::NoEligibleEvents { .. })
        ));
    }

    #[tokio::test]
    async fn test_out_of_universe_events_skipped_in_file_order() {
        let engine = StudyEngine::new(config(&["BTC-USD"]), Box::new(SyntheticProvider));
        for _ in 0..5 {
            let output = engine.run_with_events(events()).await.unwrap();
            let skipped: Vec<&str> = output
                .summary
                .skipped_events
                .iter()
                .map(|s| s.event_id.as_str())
                .collect();
            // outside the universe first, then the uncovered BTC event
            assert_eq!(skipped, vec!["J2", "D1", "X1", "EARLY"]);
        }
    }

    #[tokio::test]
    async fn test_market_model_benchmark_is_mean_adjusted() {
        let engine = StudyEngine::new(
            market_config(&["BTC-USD", "ETH-USD"], "BTC-USD"),
            Box::new(SyntheticProvider),
        );
        let output = engine.run_with_events(events()).await.unwrap();

        let j1 = output.results.iter().find(|r| r.event_id == "J1").unwrap();
        assert_eq!(j1.params.alpha, 0.0);
        assert_eq!(j1.params.beta, 0.0);
        assert!(j1.final_car().unwrap() > 0.05 - 13.0 * 5e-4);

        // Same path as the benchmark: beta of one, and the jump is explained away
        let j2 = output.results.iter().find(|r| r.event_id == "J2").unwrap();
        assert!((j2.params.beta - 1.0).abs() < 1e-9);
        assert!(j2.final_car().unwrap().abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_market_model_fetches_benchmark_outside_symbol_list() {
        let engine = StudyEngine::new(
            market_config(&["ETH-USD"], "BTC-USD"),
            Box::new(SyntheticProvider),
        );
        let output = engine.run_with_events(events()).await.unwrap();

        assert!(output.prices.contains_key("BTC-USD"));
        let ids: Vec<&str> = output.results.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["J2"]);
        assert!((output.results[0].params.beta - 1.0).abs() < 1e-9);
        // BTC events are not studied just because BTC is the benchmark
        assert!(
            output
                .summary
                .skipped_events
                .iter()
                .any(|s| s.event_id == "J1")
        );
    }

    #[tokio::test]
    async fn test_market_model_falls_back_when_benchmark_fails() {
        let engine = StudyEngine::new(
            market_config(&["BTC-USD", "ETH-USD"], "DEAD-USD"),
            Box::new(SyntheticProvider),
        );
        let output = engine.run_with_events(events()).await.unwrap();

        assert_eq!(output.results.len(), 2);
        assert!(
            output
                .results
                .iter()
                .all(|r| r.params.alpha == 0.0 && r.params.beta == 0.0)
        );
        assert!(output.results.iter().all(|r| r.final_car().unwrap() > 0.04));
        // DEAD-USD has no events in the universe, so it is not reported as a skipped symbol
        assert!(output.summary.skipped_symbols.is_empty());
    }
}
