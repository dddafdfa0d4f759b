use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Direction;

/// Two-sided interval, typically 2.5% / 97.5% quantiles.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

/// Parameters of the normal-return model used for one event.
/// `beta` is 0 and `alpha` is the estimation-window mean under the mean-adjusted model.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    pub alpha: f64,
    pub beta: f64,
}

/// AR/CAR for a single event, indexed by offset k = 0..=W from the event bar.
/// Invariant: `car[k] == ar[0] + ... + ar[k]`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventWindowResult {
    pub event_id: String,
    pub symbol: String,
    pub category: String,
    pub direction: Direction,
    pub event_ts: DateTime<Utc>,
    /// Timestamp of the return at offset 0
    pub anchor_ts: DateTime<Utc>,
    /// Mean estimation-window return (the flat expected return)
    pub baseline: f64,
    pub params: ModelParams,
    pub ar: Vec<f64>,
    pub car: Vec<f64>,
    pub car_ci: Option<ConfidenceInterval>,
}

impl EventWindowResult {
    /// Number of offsets, i.e. W + 1
    pub fn window_len(&self) -> usize {
        self.ar.len()
    }

    pub fn final_car(&self) -> Option<f64> {
        self.car.last().copied()
    }
}

/// Why a result or event did not contribute.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExcludedEvent {
    pub event_id: String,
    pub reason: String,
}

/// Mean AR/CAR across the events that survived filtering, aligned by offset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AggregateResult {
    /// Human label, e.g. "BTC-USD" or "category: ETF Approval"
    pub label: String,
    pub mean_ar: Vec<f64>,
    pub mean_car: Vec<f64>,
    pub event_ids: Vec<String>,
    pub excluded: Vec<ExcludedEvent>,
    /// Cross-sectional spread of final CAR, only with enough events
    pub car_ci: Option<ConfidenceInterval>,
}

impl AggregateResult {
    pub fn n_events(&self) -> usize {
        self.event_ids.len()
    }

    pub fn final_mean_car(&self) -> Option<f64> {
        self.mean_car.last().copied()
    }
}
