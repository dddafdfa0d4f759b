pub mod bn_kline;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::time::Instant;

use crate::data::timeseries::{PriceSeriesProvider, gaps};
use crate::domain::Symbol;
use crate::error::{EventStudyError, Result};
use crate::models::PriceSeries;
use crate::utils::time_utils;

/// Hourly close prices from the Binance spot klines endpoint.
/// Bars are stamped with their open time.
pub struct BNAPIVersion;

#[async_trait]
impl PriceSeriesProvider for BNAPIVersion {
    fn signature(&self) -> &'static str {
        "Binance API"
    }

    async fn fetch_price_series(&self, symbol: &Symbol, lookback: Duration) -> Result<PriceSeries> {
        let start_time = Instant::now();
        let start_ms = (Utc::now() - lookback).timestamp_millis();

        let klines = bn_kline::load_klines(symbol, start_ms)
            .await
            .map_err(|e| EventStudyError::price_fetch(&symbol.name, format!("{:#}", e)))?;
        if klines.is_empty() {
            return Err(EventStudyError::price_fetch(&symbol.name, "no data returned"));
        }

        let points: Vec<_> = klines
            .into_iter()
            .filter_map(|k| time_utils::epoch_ms_to_utc(k.open_timestamp_ms).zip(k.close_price))
            .collect();

        log::info!(
            "{} ({}): {} klines loaded in {:?}",
            symbol,
            symbol.exchange_name(),
            points.len(),
            start_time.elapsed()
        );

        gaps::regularize(symbol.clone(), points)
            .map_err(|e| EventStudyError::price_fetch(&symbol.name, e.to_string()))
    }
}
