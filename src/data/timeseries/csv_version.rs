use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::data::timeseries::{PriceSeriesProvider, gaps};
use crate::domain::Symbol;
use crate::error::{EventStudyError, Result};
use crate::models::PriceSeries;
use crate::utils::time_utils;

const TIMESTAMP_COLUMNS: &[&str] = &["ts_utc", "datetime", "timestamp", "date", "open_time"];
const PRICE_COLUMNS: &[&str] = &["close", "price"];

/// Offline provider: reads `<dir>/<SYMBOL>.csv`.
///
/// The file needs a timestamp column (ISO-8601 or epoch milliseconds) and a
/// `close` (or `price`) column; other OHLCV columns are ignored. The lookback
/// is measured back from the last row rather than from now.
pub struct CsvVersion {
    pub dir: PathBuf,
}

impl CsvVersion {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &Symbol) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol.file_stem()))
    }
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| candidates.contains(&h.trim().to_lowercase().as_str()))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    time_utils::parse_utc_timestamp(text).or_else(|| {
        text.trim()
            .parse::<i64>()
            .ok()
            .and_then(time_utils::epoch_ms_to_utc)
    })
}

/// Read raw (timestamp, close) points, skipping rows that do not parse
pub fn read_price_points(path: &Path) -> Result<Vec<(DateTime<Utc>, f64)>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let ts_col = find_column(&headers, TIMESTAMP_COLUMNS).ok_or_else(|| {
        EventStudyError::MissingColumns(vec![format!("one of {}", TIMESTAMP_COLUMNS.join("/"))])
    })?;
    let price_col = find_column(&headers, PRICE_COLUMNS).ok_or_else(|| {
        EventStudyError::MissingColumns(vec![format!("one of {}", PRICE_COLUMNS.join("/"))])
    })?;

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let parsed = record
            .get(ts_col)
            .and_then(parse_timestamp)
            .zip(record.get(price_col).and_then(|p| p.parse::<f64>().ok()));
        match parsed {
            Some(point) => points.push(point),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("{}: skipped {} unparseable price rows", path.display(), skipped);
    }
    Ok(points)
}

#[async_trait]
impl PriceSeriesProvider for CsvVersion {
    fn signature(&self) -> &'static str {
        "Local CSV"
    }

    async fn fetch_price_series(&self, symbol: &Symbol, lookback: Duration) -> Result<PriceSeries> {
        let path = self.path_for(symbol);
        let mut points = read_price_points(&path)
            .map_err(|e| EventStudyError::price_fetch(&symbol.name, format!("{}: {}", path.display(), e)))?;
        if points.is_empty() {
            return Err(EventStudyError::price_fetch(
                &symbol.name,
                format!("no data in {}", path.display()),
            ));
        }

        if let Some(latest) = points.iter().map(|(ts, _)| *ts).max() {
            let cutoff = latest - lookback;
            points.retain(|(ts, _)| *ts >= cutoff);
        }

        gaps::regularize(symbol.clone(), points)
            .map_err(|e| EventStudyError::price_fetch(&symbol.name, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TimeUtils;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_reads_ohlcv_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "BTC-USD.csv",
            "datetime,open,high,low,close,volume\n\
             2024-01-01T00:00:00Z,1,1,1,100.0,5\n\
             2024-01-01T01:00:00Z,1,1,1,101.0,5\n\
             not-a-date,1,1,1,102.0,5\n\
             2024-01-01T02:00:00Z,1,1,1,102.0,5\n",
        );
        let provider = CsvVersion::new(dir.path());
        let symbol = Symbol::new("BTC-USD", TimeUtils::MS_IN_H);
        let series = provider
            .fetch_price_series(&symbol, Duration::days(30))
            .await
            .unwrap();
        assert_eq!(series.prices(), &[100.0, 101.0, 102.0]);
    }

    #[tokio::test]
    async fn test_lookback_trims_from_last_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("ts_utc,close\n");
        for h in 0..48 {
            body.push_str(&format!("{},{}\n", 1_704_067_200_000i64 + h * TimeUtils::MS_IN_H, 10 + h));
        }
        write_file(dir.path(), "ETH-USD.csv", &body);
        let provider = CsvVersion::new(dir.path());
        let symbol = Symbol::new("ETH-USD", TimeUtils::MS_IN_H);
        let series = provider
            .fetch_price_series(&symbol, Duration::hours(10))
            .await
            .unwrap();
        assert_eq!(series.len(), 11);
        assert_eq!(series.prices()[10], 57.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_price_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvVersion::new(dir.path());
        let symbol = Symbol::new("NOPE-USD", TimeUtils::MS_IN_H);
        let err = provider
            .fetch_price_series(&symbol, Duration::days(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EventStudyError::PriceFetch { .. }));
    }
}
