use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures of the event-study core.
///
/// Per-symbol and per-event variants (`PriceFetch`, `EventNotCovered`,
/// `InsufficientData`) are recoverable at batch level: the engine records them
/// and moves on. `NoEligibleEvents` on the overall aggregate halts the run.
#[derive(Debug, Error)]
pub enum EventStudyError {
    #[error("insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error(
        "event at {event_ts} not covered: need {needed_before} periods before and {needed_after} after, series has {available_before} before and {available_after} after"
    )]
    EventNotCovered {
        event_ts: DateTime<Utc>,
        needed_before: usize,
        needed_after: usize,
        available_before: usize,
        available_after: usize,
    },

    #[error("price fetch failed for {symbol}: {reason}")]
    PriceFetch { symbol: String, reason: String },

    #[error("no eligible events to aggregate ({context})")]
    NoEligibleEvents { context: String },

    #[error("malformed price series: {0}")]
    MalformedSeries(String),

    #[error("event file is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EventStudyError {
    pub fn price_fetch(symbol: &str, reason: impl Into<String>) -> Self {
        Self::PriceFetch {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn no_eligible(context: impl Into<String>) -> Self {
        Self::NoEligibleEvents {
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EventStudyError>;
