pub mod bnapi_version;
pub mod csv_version;
pub mod gaps;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Duration;

use crate::domain::Symbol;
use crate::error::{EventStudyError, Result};
use crate::models::PriceSeries;

pub use bnapi_version::BNAPIVersion;
pub use csv_version::CsvVersion;

/// A source of price history for one symbol at a time.
#[async_trait]
pub trait PriceSeriesProvider: Send + Sync {
    /// Either return the symbol's series covering `lookback` up to now, or a `PriceFetch` error
    async fn fetch_price_series(&self, symbol: &Symbol, lookback: Duration) -> Result<PriceSeries>;

    /// A unique identifier for this implementation (so that afterwards we know which one we used).
    fn signature(&self) -> &'static str;
}

/// Series fetched during one run, plus the symbols that could not be fetched.
#[derive(Debug, Default)]
pub struct PriceCollection {
    pub series: BTreeMap<String, PriceSeries>,
    pub failures: Vec<(String, EventStudyError)>,
}

impl PriceCollection {
    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }
}

/// Fetch each symbol once, one after another.
/// A failure only affects its own symbol; it is logged and recorded, never propagated.
pub async fn fetch_price_collection(
    provider: &dyn PriceSeriesProvider,
    symbols: &[Symbol],
    lookback: Duration,
) -> PriceCollection {
    let mut collection = PriceCollection::default();
    for symbol in symbols {
        if collection.series.contains_key(&symbol.name) {
            continue;
        }
        log::info!("Fetching {} from {}...", symbol, provider.signature());
        match provider.fetch_price_series(symbol, lookback).await {
            Ok(series) if series.len() < 2 => {
                let err = EventStudyError::price_fetch(
                    &symbol.name,
                    format!("only {} price points returned", series.len()),
                );
                log::warn!("⚠️  {}", err);
                collection.failures.push((symbol.name.clone(), err));
            }
            Ok(series) => {
                log::info!(
                    "{}: {} bars from {:?} to {:?}",
                    symbol,
                    series.len(),
                    series.first_timestamp(),
                    series.last_timestamp()
                );
                collection.series.insert(symbol.name.clone(), series);
            }
            Err(e) => {
                log::warn!("⚠️  Skipping {}: {}", symbol, e);
                collection.failures.push((symbol.name.clone(), e));
            }
        }
    }
    collection
}
