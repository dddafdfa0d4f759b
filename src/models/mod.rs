// Data carried between pipeline stages.
// Everything here is built once per run and not mutated afterwards.

pub mod event_window;
pub mod price_series;

pub use event_window::{
    AggregateResult, ConfidenceInterval, EventWindowResult, ExcludedEvent, ModelParams,
};
pub use price_series::{PriceSeries, ReturnSeries};
