// Std library crates
use std::collections::HashSet;
use std::convert::TryFrom;
use std::error::Error;
use std::fmt;
use std::time::SystemTime;

// External crates
use anyhow::{Result, bail};
use binance_sdk::common::models::Interval as binance_interval;
use binance_sdk::config::ConfigurationRestApi;
use binance_sdk::models::RestApiRateLimit;
use binance_sdk::spot::{
    SpotRestApi,
    rest_api::{KlinesIntervalEnum, KlinesItemInner, KlinesParams, RestApi},
};
use binance_sdk::{errors, errors::ConnectorError as connection_error};
use tokio::time::{Duration, sleep};

// Local crates
#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
use crate::config::binance::{BINANCE, BinanceApiConfig};
use crate::domain::Symbol;
use crate::utils::TimeUtils;

// "MS -> Enum". Returns Result instead of panicking.
pub fn try_interval_from_ms(ms: i64) -> Result<KlinesIntervalEnum, String> {
    match ms {
        TimeUtils::MS_IN_MIN => Ok(KlinesIntervalEnum::Interval1m),
        TimeUtils::MS_IN_15_MIN => Ok(KlinesIntervalEnum::Interval15m),
        TimeUtils::MS_IN_30_MIN => Ok(KlinesIntervalEnum::Interval30m),
        TimeUtils::MS_IN_H => Ok(KlinesIntervalEnum::Interval1h),
        TimeUtils::MS_IN_2_H => Ok(KlinesIntervalEnum::Interval2h),
        TimeUtils::MS_IN_4_H => Ok(KlinesIntervalEnum::Interval4h),
        TimeUtils::MS_IN_D => Ok(KlinesIntervalEnum::Interval1d),
        _ => Err(format!("Unsupported interval: {}ms", ms)),
    }
}

#[derive(Debug, PartialOrd, PartialEq)]
pub struct BNKline {
    pub open_timestamp_ms: i64, // only necessary field
    pub close_price: Option<f64>,
}

// Custom error type for BNKline for better error messages.
#[derive(Debug)]
pub enum BNKlineError {
    InvalidLength,
    InvalidType(String),
    ConnectionFailed(String),
}

impl fmt::Display for BNKlineError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BNKlineError::InvalidLength => write!(f, "Invalid length"),
            BNKlineError::InvalidType(string) => write!(f, "Invalid type: {}", string),
            BNKlineError::ConnectionFailed(msg) => {
                write!(f, "Binance API connection failed: {}.", msg)
            }
        }
    }
}

impl Error for BNKlineError {}

// Some(f64) only if the item is the String variant and parses as a float.
fn kline_item_to_float(item: Option<KlinesItemInner>) -> Option<f64> {
    item.and_then(|inner| {
        if let KlinesItemInner::String(s) = inner {
            s.parse::<f64>().ok()
        } else {
            None
        }
    })
}

// Kline layout: [open_time, open, high, low, close, volume, close_time, ...]
impl TryFrom<Vec<KlinesItemInner>> for BNKline {
    type Error = BNKlineError;

    fn try_from(vec_inner_klines: Vec<KlinesItemInner>) -> Result<Self, Self::Error> {
        let mut items = vec_inner_klines.into_iter();
        let open_timestamp_ms = match items.next().ok_or(BNKlineError::InvalidLength)? {
            KlinesItemInner::Integer(a) => a,
            _ => return Err(BNKlineError::InvalidType("open_time".to_string())),
        };
        // skip open, high, low
        let close_price = kline_item_to_float(items.nth(3));

        Ok(BNKline {
            open_timestamp_ms,
            close_price,
        })
    }
}

fn convert_klines(data: Vec<Vec<KlinesItemInner>>) -> Result<Vec<BNKline>, BNKlineError> {
    data.into_iter().map(Vec::try_into).collect()
}

async fn configure_binance_client() -> Result<RestApi, anyhow::Error> {
    let config = BinanceApiConfig::default();
    let rest_conf = ConfigurationRestApi::builder()
        .timeout(config.timeout_ms)
        .retries(config.retries)
        .backoff(config.backoff_ms)
        .build()?;
    // Create the Spot REST API client
    let rest_client = SpotRestApi::production(rest_conf);
    Ok(rest_client)
}

async fn handle_rate_limits(
    rate_limits: &Option<Vec<RestApiRateLimit>>,
    symbol: &Symbol,
    kline_call_weight: u32,
    bn_weight_limit_minute: u32,
) -> Result<(), anyhow::Error> {
    let Some(value) = rate_limits else {
        return Ok(());
    };
    for rate_limit in value {
        if rate_limit.interval_num == 1 && rate_limit.interval == binance_interval::Minute {
            let current_weight = rate_limit.count;
            let required_headroom = bn_weight_limit_minute.saturating_sub(kline_call_weight);
            if current_weight > required_headroom {
                // Sleep until the start of the next minute
                let duration_since_epoch = SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or_default();
                let secs_into_min = duration_since_epoch.as_secs() % 60;
                let sleep_duration = Duration::from_secs(60 - secs_into_min);
                log::info!(
                    "{} Current weight ({}) > required headroom ({}), sleeping {:?}",
                    symbol,
                    current_weight,
                    required_headroom,
                    sleep_duration
                );
                sleep(sleep_duration).await;
            }
        }
    }
    Ok(())
}

/// Prepend one page of klines (pages arrive newest first).
/// Returns the next end_time and whether paging is finished.
fn process_new_klines(
    new_klines: Vec<Vec<KlinesItemInner>>,
    limit_klines_returned: i32,
    start_ms: i64,
    all_klines: &mut Vec<BNKline>,
    symbol: &Symbol,
) -> Result<(Option<i64>, bool), anyhow::Error> {
    let mut bn_klines = convert_klines(new_klines)
        .map_err(|e| anyhow::Error::new(e).context(format!("{} convert_klines failed", symbol)))?;

    if bn_klines.is_empty() {
        if all_klines.is_empty() {
            bail!("{}: Binance returned no klines", symbol);
        }
        return Ok((None, true));
    }

    let read_all_klines =
        bn_klines.len() < limit_klines_returned as usize || bn_klines[0].open_timestamp_ms <= start_ms;

    // New end_time is open time of first entry in bn_klines
    let end_time = Some(bn_klines[0].open_timestamp_ms);

    // endTime is inclusive, so the last item of this page repeats the first we already hold
    if let (Some(last_new), Some(first_held)) = (bn_klines.last(), all_klines.first()) {
        if last_new.open_timestamp_ms == first_held.open_timestamp_ms {
            bn_klines.pop();
        }
    }
    if bn_klines.is_empty() {
        return Ok((end_time, true));
    }

    all_klines.splice(0..0, bn_klines);
    Ok((end_time, read_all_klines))
}

async fn fetch_binance_klines_with_limits(
    rest_client: &RestApi,
    params: KlinesParams,
    symbol: &Symbol,
) -> Result<(Option<Vec<RestApiRateLimit>>, Vec<Vec<KlinesItemInner>>), anyhow::Error> {
    match rest_client.klines(params).await {
        Ok(r) => {
            let rate_limits = r.rate_limits.clone();
            let data = r.data().await?;
            Ok((rate_limits, data))
        }
        Err(e) => {
            if let Some(conn_err) = e.downcast_ref::<errors::ConnectorError>() {
                let hint = match conn_err {
                    connection_error::ConnectorClientError(_) => "client error, check the symbol",
                    connection_error::TooManyRequestsError(_) => "rate limit exceeded",
                    connection_error::RateLimitBanError(_) => "IP banned for excessive requests",
                    errors::ConnectorError::ServerError { .. } => "server error",
                    errors::ConnectorError::NetworkError(_) => "network error",
                    errors::ConnectorError::NotFoundError(_) => "resource not found",
                    connection_error::BadRequestError(_) => "bad request, check the symbol",
                    _ => "unexpected connector error",
                };
                log::error!("{} {}: {}", symbol, hint, conn_err);
                Err(
                    anyhow::Error::new(BNKlineError::ConnectionFailed(conn_err.to_string()))
                        .context(format!("Binance API call failed for {} ({})", symbol, hint)),
                )
            } else {
                log::error!("An unexpected error occurred for {}: {:#}", symbol, e);
                Err(
                    anyhow::Error::new(BNKlineError::ConnectionFailed(e.to_string()))
                        .context(format!("Unexpected error during API call for {}", symbol)),
                )
            }
        }
    }
}

/// Page backwards from now until `start_ms` is covered.
/// Returns klines ascending by open time, none earlier than `start_ms`.
pub async fn load_klines(symbol: &Symbol, start_ms: i64) -> Result<Vec<BNKline>, anyhow::Error> {
    let rest_client = configure_binance_client().await?;

    let limit_klines_returned = BINANCE.limits.klines_limit;
    let mut end_time: Option<i64> = None;
    let mut all_klines: Vec<BNKline> = Vec::new();
    #[cfg(debug_assertions)]
    let mut loop_count: u32 = 0;

    for _ in 0..BINANCE.limits.max_pages {
        let params = KlinesParams::builder(
            symbol.exchange_name(),
            try_interval_from_ms(symbol.interval_ms).map_err(anyhow::Error::msg)?,
        )
        .limit(limit_klines_returned)
        .end_time(end_time)
        .build()?;

        let (rate_limits, new_klines) =
            fetch_binance_klines_with_limits(&rest_client, params, symbol).await?;

        handle_rate_limits(
            &rate_limits,
            symbol,
            BINANCE.limits.kline_call_weight,
            BINANCE.limits.weight_limit_minute,
        )
        .await?;

        let (new_end_time, finished) =
            process_new_klines(new_klines, limit_klines_returned, start_ms, &mut all_klines, symbol)?;

        #[cfg(debug_assertions)]
        {
            if DEBUG_FLAGS.print_fetch_pages && loop_count.is_multiple_of(BINANCE.debug_print_interval) {
                log::info!("{} page {}: {} klines so far", symbol, loop_count, all_klines.len());
            }
            loop_count += 1;
        }

        end_time = new_end_time;
        if finished {
            break;
        }
    }

    if has_duplicate_kline_open_time(&all_klines) {
        bail!("{}: duplicate kline open times in Binance data", symbol);
    }
    all_klines.retain(|k| k.open_timestamp_ms >= start_ms);
    Ok(all_klines)
}

fn has_duplicate_kline_open_time(klines: &[BNKline]) -> bool {
    let mut seen_ids = HashSet::new();
    klines.iter().any(|kline| !seen_ids.insert(kline.open_timestamp_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(open_ms: i64, close: &str) -> Vec<KlinesItemInner> {
        vec![
            KlinesItemInner::Integer(open_ms),
            KlinesItemInner::String("1".to_string()),
            KlinesItemInner::String("1".to_string()),
            KlinesItemInner::String("1".to_string()),
            KlinesItemInner::String(close.to_string()),
            KlinesItemInner::String("0".to_string()),
        ]
    }

    fn symbol() -> Symbol {
        Symbol::new("BTC-USD", TimeUtils::MS_IN_H)
    }

    #[test]
    fn test_kline_conversion_reads_close() {
        let kline = BNKline::try_from(raw(3_600_000, "42.5")).unwrap();
        assert_eq!(kline.open_timestamp_ms, 3_600_000);
        assert_eq!(kline.close_price, Some(42.5));
    }

    #[test]
    fn test_kline_conversion_rejects_bad_open_time() {
        let bad = vec![KlinesItemInner::String("x".to_string())];
        assert!(matches!(
            BNKline::try_from(bad),
            Err(BNKlineError::InvalidType(_))
        ));
        assert!(matches!(
            BNKline::try_from(Vec::new()),
            Err(BNKlineError::InvalidLength)
        ));
    }

    #[test]
    fn test_pages_are_prepended_without_duplicates() {
        let h = TimeUtils::MS_IN_H;
        let mut all = Vec::new();
        let page1 = (3..6).map(|i| raw(i * h, "1")).collect();
        let (end, done) = process_new_klines(page1, 3, 0, &mut all, &symbol()).unwrap();
        assert_eq!(end, Some(3 * h));
        assert!(!done);

        // endTime inclusive: the newest item repeats what we hold
        let page2 = (1..4).map(|i| raw(i * h, "1")).collect();
        let (_, done) = process_new_klines(page2, 3, 0, &mut all, &symbol()).unwrap();
        assert!(!done);
        let opens: Vec<i64> = all.iter().map(|k| k.open_timestamp_ms / h).collect();
        assert_eq!(opens, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_paging_stops_once_start_is_reached() {
        let h = TimeUtils::MS_IN_H;
        let mut all = Vec::new();
        let page = (10..13).map(|i| raw(i * h, "1")).collect();
        let (_, done) = process_new_klines(page, 3, 11 * h, &mut all, &symbol()).unwrap();
        assert!(done);
    }
}
