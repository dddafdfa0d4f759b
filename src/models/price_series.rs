use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Symbol;
use crate::error::{EventStudyError, Result};

// ============================================================================
// PriceSeries: validated (timestamp, price) observations for one symbol
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: Symbol,
    timestamps: Vec<DateTime<Utc>>,
    prices: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from (timestamp, price) points.
    /// Timestamps must be strictly ascending and prices finite and positive.
    pub fn new(symbol: Symbol, points: Vec<(DateTime<Utc>, f64)>) -> Result<Self> {
        for (i, (ts, price)) in points.iter().enumerate() {
            if !price.is_finite() || *price <= 0.0 {
                return Err(EventStudyError::MalformedSeries(format!(
                    "{}: price {} at {} is not a positive finite number",
                    symbol.name, price, ts
                )));
            }
            if i > 0 && points[i - 1].0 >= *ts {
                return Err(EventStudyError::MalformedSeries(format!(
                    "{}: timestamps not strictly ascending at index {} ({} then {})",
                    symbol.name,
                    i,
                    points[i - 1].0,
                    ts
                )));
            }
        }
        let (timestamps, prices) = points.into_iter().unzip();
        Ok(Self {
            symbol,
            timestamps,
            prices,
        })
    }

    /// Like `new`, but sorts first and keeps the last observation of any duplicated timestamp.
    /// Providers use this on raw exchange/file data.
    pub fn from_unsorted(symbol: Symbol, mut points: Vec<(DateTime<Utc>, f64)>) -> Result<Self> {
        points.sort_by_key(|(ts, _)| *ts);
        let mut deduped: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.0 == point.0 => *last = point,
                _ => deduped.push(point),
            }
        }
        Self::new(symbol, deduped)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Points with timestamps in [start, end]
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(DateTime<Utc>, f64)> {
        let lo = self.timestamps.partition_point(|ts| *ts < start);
        let hi = self.timestamps.partition_point(|ts| *ts <= end);
        self.timestamps[lo..hi]
            .iter()
            .copied()
            .zip(self.prices[lo..hi].iter().copied())
            .collect()
    }
}

// ============================================================================
// ReturnSeries: one-period returns derived from a PriceSeries
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub symbol: Symbol,
    timestamps: Vec<DateTime<Utc>>,
    returns: Vec<f64>,
}

impl ReturnSeries {
    /// Caller guarantees ascending timestamps and equal lengths
    pub(crate) fn from_parts(symbol: Symbol, timestamps: Vec<DateTime<Utc>>, returns: Vec<f64>) -> Self {
        debug_assert_eq!(timestamps.len(), returns.len());
        Self {
            symbol,
            timestamps,
            returns,
        }
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Index of the last entry at or before `ts`
    pub fn index_at_or_before(&self, ts: DateTime<Utc>) -> Option<usize> {
        let after = self.timestamps.partition_point(|t| *t <= ts);
        after.checked_sub(1)
    }

    /// Exact-timestamp lookup
    pub fn return_at(&self, ts: DateTime<Utc>) -> Option<f64> {
        self.timestamps
            .binary_search(&ts)
            .ok()
            .map(|idx| self.returns[idx])
    }
}
