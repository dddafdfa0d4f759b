use chrono::{DateTime, Utc};

use crate::domain::Symbol;
use crate::error::{EventStudyError, Result};
use crate::models::PriceSeries;
use crate::utils::{maths_utils, time_utils};

// MAX_PCT_MISSING_BARS_ALLOWED is a delimiter. If the raw data has < % of missing bars than this, we simply forward-fill the missing bars.
// But if it has > % missing, we instead cut off everything up to and including the last gap, and keep only the `pure` tail.
const MAX_PCT_MISSING_BARS_ALLOWED: f64 = 10.;

fn count_pct_none(values: &[Option<f64>]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let none_count = values.iter().filter(|v| v.is_none()).count();
    none_count as f64 * 100.0 / values.len() as f64
}

fn find_last_none_index(values: &[Option<f64>]) -> Option<usize> {
    values.iter().rposition(|v| v.is_none())
}

/// Forward-fill Nones in place, returns how many were filled.
/// The first slot is never None (the grid starts at the first observation).
fn fill_forward(values: &mut [Option<f64>]) -> usize {
    let mut filled = 0;
    let mut last = None;
    for slot in values.iter_mut() {
        match slot {
            Some(v) => last = Some(*v),
            None => {
                *slot = last;
                filled += 1;
            }
        }
    }
    filled
}

/// Snap raw observations onto the symbol's bar grid and deal with missing bars.
///
/// Off-grid timestamps fall back to the bar they belong to (the later
/// observation wins). Small gap totals are forward-filled; large ones cut the
/// series down to the gap-free tail.
pub fn regularize(symbol: Symbol, points: Vec<(DateTime<Utc>, f64)>) -> Result<PriceSeries> {
    let interval_ms = symbol.interval_ms;
    if interval_ms <= 0 {
        return Err(EventStudyError::MalformedSeries(format!(
            "{}: bar interval must be positive",
            symbol.name
        )));
    }
    let raw = PriceSeries::from_unsorted(symbol, points)?;
    let (Some(first), Some(last)) = (raw.first_timestamp(), raw.last_timestamp()) else {
        return Ok(raw);
    };

    let first_ms = first.timestamp_millis();
    let n_bars = maths_utils::intervals(first_ms, last.timestamp_millis(), interval_ms) as usize;
    let mut grid: Vec<Option<f64>> = vec![None; n_bars];
    for (ts, price) in raw.timestamps().iter().zip(raw.prices()) {
        let idx = maths_utils::index_into_range(first_ms, ts.timestamp_millis(), interval_ms) as usize;
        grid[idx] = Some(*price);
    }

    let pct_gaps = count_pct_none(&grid);
    let mut start_idx = 0;
    if pct_gaps > MAX_PCT_MISSING_BARS_ALLOWED {
        if let Some(last_none) = find_last_none_index(&grid) {
            log::warn!(
                "{} has {:.2}% missing bars, above the {:.2}% limit; keeping only the {} bars after the last gap",
                raw.symbol,
                pct_gaps,
                MAX_PCT_MISSING_BARS_ALLOWED,
                n_bars - last_none - 1
            );
            start_idx = last_none + 1;
        }
    }
    let grid = &mut grid[start_idx..];
    let filled = fill_forward(grid);
    if filled > 0 {
        log::info!("{}: forward-filled {} missing bars", raw.symbol, filled);
    }

    let points = grid
        .iter()
        .enumerate()
        .filter_map(|(i, price)| {
            let ts_ms = first_ms + (start_idx + i) as i64 * interval_ms;
            time_utils::epoch_ms_to_utc(ts_ms).zip(*price)
        })
        .collect();
    PriceSeries::new(raw.symbol.clone(), points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TimeUtils;
    use chrono::{Duration, TimeZone};

    fn hour(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn symbol() -> Symbol {
        Symbol::new("BTC-USD", TimeUtils::MS_IN_H)
    }

    #[test]
    fn test_complete_grid_unchanged() {
        let points: Vec<_> = (0..50).map(|h| (hour(h), 100.0 + h as f64)).collect();
        let series = regularize(symbol(), points).unwrap();
        assert_eq!(series.len(), 50);
        assert_eq!(series.prices()[49], 149.0);
    }

    #[test]
    fn test_small_gap_forward_filled() {
        let points: Vec<_> = (0..50)
            .filter(|h| *h != 10)
            .map(|h| (hour(h), 100.0 + h as f64))
            .collect();
        let series = regularize(symbol(), points).unwrap();
        assert_eq!(series.len(), 50);
        assert_eq!(series.timestamps()[10], hour(10));
        assert_eq!(series.prices()[10], 109.0);
    }

    #[test]
    fn test_large_gaps_cut_to_tail() {
        // 20 of 60 bars missing, last gap at hour 39
        let points: Vec<_> = (0..60)
            .filter(|h| !(20..40).contains(h))
            .map(|h| (hour(h), 1.0 + h as f64))
            .collect();
        let series = regularize(symbol(), points).unwrap();
        assert_eq!(series.first_timestamp(), Some(hour(40)));
        assert_eq!(series.len(), 20);
    }

    #[test]
    fn test_off_grid_points_snap_back() {
        let points = vec![
            (hour(0), 1.0),
            (hour(1) + Duration::minutes(59), 2.0),
            (hour(2), 3.0),
        ];
        let series = regularize(symbol(), points).unwrap();
        assert_eq!(series.timestamps(), &[hour(0), hour(1), hour(2)]);
        assert_eq!(series.prices(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_empty_input() {
        let series = regularize(symbol(), vec![]).unwrap();
        assert!(series.is_empty());
    }
}
