//! Event-study computation defaults

use crate::utils::TimeUtils;

/// Window lengths, in bars of `interval_width_ms`
pub struct WindowSettings {
    // Bars immediately before the event bar used for the expected return.
    // 216 hourly bars = nine days
    pub estimation_periods: usize,
    // Bars after the event bar tracked for AR/CAR (offsets 0..=event_periods)
    pub event_periods: usize,
    // Upper bound for either window given on the command line
    pub max_periods: usize,
}

/// Settings for the per-event CAR bootstrap
pub struct BootstrapDefaults {
    pub enabled: bool,
    pub iterations: usize,
    pub seed: u64,
    // Event windows with this many offsets or fewer get no interval
    pub min_window_len: usize,
    // The estimation sample must exceed the window by more than this many returns
    pub min_extra_samples: usize,
}

/// Settings for aggregation and reporting of aggregates
pub struct AggregateDefaults {
    // Cross-sectional CAR interval needs at least this many events
    pub min_events_for_ci: usize,
    // Below this many events a symbol gets a small-sample caution in the report
    pub small_sample_threshold: usize,
}

/// Settings for the opt-in market model
pub struct MarketModelDefaults {
    // Fewer matched benchmark/target pairs than this and alpha = beta = 0
    pub min_observations: usize,
}

/// The Master Analysis Configuration
pub struct AnalysisConfig {
    // Bar interval for all price series (1h)
    pub interval_width_ms: i64,
    // How far back the provider fetches
    pub lookback_days: i64,
    pub max_lookback_days: i64,
    // Symbols studied when none are given on the command line
    pub default_symbols: &'static [&'static str],

    pub windows: WindowSettings,
    pub bootstrap: BootstrapDefaults,
    pub aggregate: AggregateDefaults,
    pub market_model: MarketModelDefaults,
}

pub const ANALYSIS: AnalysisConfig = AnalysisConfig {
    interval_width_ms: TimeUtils::MS_IN_H,
    // Hourly history is only served for about two years; stay inside that
    lookback_days: 720,
    max_lookback_days: 3650,
    default_symbols: &["BTC-USD", "ETH-USD", "SOL-USD", "DOGE-USD"],

    windows: WindowSettings {
        estimation_periods: 216,
        event_periods: 24,
        max_periods: 10_000,
    },

    bootstrap: BootstrapDefaults {
        enabled: true,
        iterations: 1000,
        seed: 42,
        min_window_len: 3,
        min_extra_samples: 10,
    },

    aggregate: AggregateDefaults {
        min_events_for_ci: 5,
        small_sample_threshold: 5,
    },

    market_model: MarketModelDefaults {
        min_observations: 10,
    },
};
