// The event-study core: returns, abnormal returns, aggregation
pub mod abnormal;
pub mod aggregate;
pub mod returns;
pub mod stats;

// Re-export commonly used types
pub use abnormal::{
    AbnormalReturns, EventStudy, NormalReturnModel, WindowSpec, estimate_abnormal_returns,
    estimate_market_model,
};
pub use aggregate::{AggregateFilter, AggregateSettings, aggregate};
pub use returns::{ReturnKind, to_returns};
pub use stats::BootstrapSettings;
