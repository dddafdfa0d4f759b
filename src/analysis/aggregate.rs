use serde::{Deserialize, Serialize};

use crate::analysis::stats;
use crate::domain::Direction;
use crate::error::{EventStudyError, Result};
use crate::models::{AggregateResult, EventWindowResult, ExcludedEvent};
use crate::utils::maths_utils;

/// Which results take part in an aggregate. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateFilter {
    pub category: Option<String>,
    pub symbol: Option<String>,
    pub direction: Option<Direction>,
}

impl AggregateFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Self::default()
        }
    }

    pub fn by_category(category: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, result: &EventWindowResult) -> bool {
        self.category.as_ref().is_none_or(|c| *c == result.category)
            && self.symbol.as_ref().is_none_or(|s| *s == result.symbol)
            && self.direction.is_none_or(|d| d == result.direction)
    }

    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(symbol) = &self.symbol {
            parts.push(symbol.clone());
        }
        if let Some(category) = &self.category {
            parts.push(format!("category: {}", category));
        }
        if let Some(direction) = &self.direction {
            parts.push(format!("direction: {}", direction));
        }
        if parts.is_empty() {
            "all events".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Knobs for the aggregator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSettings {
    /// Number of offsets every contributing result must have (W + 1)
    pub window_len: usize,
    /// Minimum contributing events before a cross-sectional CAR interval is reported
    pub min_events_for_ci: usize,
}

/// Elementwise mean AR and mean CAR over results matching `filter`.
///
/// Results with fewer than `window_len` offsets are excluded with a warning.
/// Longer results contribute their first `window_len` offsets.
pub fn aggregate(
    results: &[EventWindowResult],
    filter: &AggregateFilter,
    settings: &AggregateSettings,
) -> Result<AggregateResult> {
    let label = filter.label();
    let mut excluded = Vec::new();
    let mut eligible: Vec<&EventWindowResult> = Vec::new();

    for result in results.iter().filter(|r| filter.matches(r)) {
        if result.window_len() < settings.window_len {
            log::warn!(
                "{}: excluding event {} from aggregate, window has {} offsets but {} are required",
                label,
                result.event_id,
                result.window_len(),
                settings.window_len
            );
            excluded.push(ExcludedEvent {
                event_id: result.event_id.clone(),
                reason: format!(
                    "window has {} offsets, {} required",
                    result.window_len(),
                    settings.window_len
                ),
            });
            continue;
        }
        eligible.push(result);
    }

    let ar_rows: Vec<&[f64]> = eligible.iter().map(|r| r.ar.as_slice()).collect();
    let car_rows: Vec<&[f64]> = eligible.iter().map(|r| r.car.as_slice()).collect();
    let (Some(mean_ar), Some(mean_car)) = (
        maths_utils::column_means(&ar_rows, settings.window_len),
        maths_utils::column_means(&car_rows, settings.window_len),
    ) else {
        return Err(EventStudyError::no_eligible(label));
    };

    let final_cars: Vec<f64> = eligible
        .iter()
        .map(|r| r.car[settings.window_len - 1])
        .collect();
    let car_ci = if final_cars.len() >= settings.min_events_for_ci {
        stats::quantile_ci(final_cars)
    } else {
        None
    };

    Ok(AggregateResult {
        label,
        mean_ar,
        mean_car,
        event_ids: eligible.iter().map(|r| r.event_id.clone()).collect(),
        excluded,
        car_ci,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelParams;
    use chrono::{TimeZone, Utc};

    fn result(id: &str, symbol: &str, category: &str, ar: Vec<f64>) -> EventWindowResult {
        let car = maths_utils::cumulative_sum(&ar);
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        EventWindowResult {
            event_id: id.to_string(),
            symbol: symbol.to_string(),
            category: category.to_string(),
            direction: Direction::Neutral,
            event_ts: ts,
            anchor_ts: ts,
            baseline: 0.0,
            params: ModelParams { alpha: 0.0, beta: 0.0 },
            ar,
            car,
            car_ci: None,
        }
    }

    fn settings(window_len: usize) -> AggregateSettings {
        AggregateSettings {
            window_len,
            min_events_for_ci: 5,
        }
    }

    #[test]
    fn test_mean_ar_of_three_events() {
        let results = vec![
            result("a", "BTC-USD", "X", vec![0.01, 0.02]),
            result("b", "BTC-USD", "X", vec![0.03, -0.02]),
            result("c", "BTC-USD", "X", vec![-0.01, 0.00]),
        ];
        let agg = aggregate(&results, &AggregateFilter::all(), &settings(2)).unwrap();
        assert!((agg.mean_ar[0] - 0.01).abs() < 1e-12);
        assert!(agg.mean_ar[1].abs() < 1e-12);
        // mean of CARs: [0.01, 0.01]
        assert!((agg.mean_car[1] - 0.01).abs() < 1e-12);
        assert_eq!(agg.n_events(), 3);
        assert!(agg.car_ci.is_none());
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let err = aggregate(&[], &AggregateFilter::all(), &settings(2)).unwrap_err();
        assert!(matches!(err, EventStudyError::NoEligibleEvents { .. }));
    }

    #[test]
    fn test_filter_with_no_match_is_an_error() {
        let results = vec![result("a", "BTC-USD", "Hack", vec![0.01, 0.02])];
        let err = aggregate(&results, &AggregateFilter::by_symbol("ETH-USD"), &settings(2));
        assert!(matches!(err, Err(EventStudyError::NoEligibleEvents { .. })));
    }

    #[test]
    fn test_short_windows_are_excluded_not_truncated() {
        let results = vec![
            result("long", "BTC-USD", "X", vec![0.01, 0.02, 0.03]),
            result("short", "BTC-USD", "X", vec![0.5, 0.5]),
        ];
        let agg = aggregate(&results, &AggregateFilter::all(), &settings(3)).unwrap();
        assert_eq!(agg.event_ids, vec!["long".to_string()]);
        assert_eq!(agg.excluded.len(), 1);
        assert_eq!(agg.excluded[0].event_id, "short");
        assert_eq!(agg.mean_ar, vec![0.01, 0.02, 0.03]);
    }

    #[test]
    fn test_all_excluded_is_an_error() {
        let results = vec![result("short", "BTC-USD", "X", vec![0.5])];
        assert!(aggregate(&results, &AggregateFilter::all(), &settings(3)).is_err());
    }

    #[test]
    fn test_category_filter_and_ci() {
        let mut results: Vec<EventWindowResult> = (0..6)
            .map(|i| result(&format!("h{i}"), "ETH-USD", "Exchange Hack", vec![-0.01 * i as f64, 0.0]))
            .collect();
        results.push(result("etf", "ETH-USD", "ETF Approval", vec![0.2, 0.2]));

        let agg = aggregate(
            &results,
            &AggregateFilter::by_category("Exchange Hack"),
            &settings(2),
        )
        .unwrap();
        assert_eq!(agg.n_events(), 6);
        assert_eq!(agg.label, "category: Exchange Hack");
        let ci = agg.car_ci.unwrap();
        assert!(ci.low <= ci.high);
        assert!(ci.high <= 0.0);
    }
}
