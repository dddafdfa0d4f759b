use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{NormalReturnModel, ReturnKind, WindowSpec};
use crate::data::RowError;
use crate::domain::Event;
use crate::models::{AggregateResult, ConfidenceInterval, EventWindowResult, PriceSeries};

/// A symbol whose events were not evaluated at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// A single event that produced no window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEvent {
    pub event_id: String,
    pub symbol: String,
    pub reason: String,
}

/// Everything that went missing during a run, for the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub provider: String,
    pub events_loaded: usize,
    pub rejected_rows: Vec<RowError>,
    pub skipped_symbols: Vec<SkippedSymbol>,
    pub skipped_events: Vec<SkippedEvent>,
}

impl RunSummary {
    pub fn skip_symbol(&mut self, symbol: &str, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("⚠️  Skipping symbol {}: {}", symbol, reason);
        self.skipped_symbols.push(SkippedSymbol {
            symbol: symbol.to_string(),
            reason,
        });
    }

    pub fn skip_event(&mut self, event: &Event, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("⚠️  Skipping event {} ({}): {}", event.id, event.symbol, reason);
        self.skipped_events.push(SkippedEvent {
            event_id: event.id.clone(),
            symbol: event.symbol.clone(),
            reason,
        });
    }
}

/// One line of the per-symbol ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRanking {
    pub symbol: String,
    pub n_events: usize,
    pub final_mean_car: f64,
    /// Sample std dev of the events' final CAR (needs two events)
    pub final_car_std: Option<f64>,
    pub car_ci: Option<ConfidenceInterval>,
    /// Fewer events than the small-sample threshold; read with caution
    pub small_sample: bool,
}

/// The settings a run used, echoed into the report's method notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodNotes {
    pub windows: WindowSpec,
    pub return_kind: ReturnKind,
    pub model: NormalReturnModel,
    pub bootstrap_iterations: Option<usize>,
    pub interval: String,
}

/// Output of one `StudyEngine` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyOutput {
    pub method: MethodNotes,
    pub events: Vec<Event>,
    pub results: Vec<EventWindowResult>,
    pub overall: AggregateResult,
    pub by_symbol: Vec<AggregateResult>,
    pub by_category: Vec<AggregateResult>,
    pub ranking: Vec<SymbolRanking>,
    pub summary: RunSummary,
    /// Fetched series, kept for price-context charts only
    #[serde(skip)]
    pub prices: BTreeMap<String, PriceSeries>,
}

impl StudyOutput {
    pub fn event(&self, event_id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == event_id)
    }
}
