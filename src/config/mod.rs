//! Configuration module for the event-study pipeline.

pub mod analysis;
pub mod binance;

mod debug; // Private: files use crate::config::DEBUG_FLAGS, not crate::config::debug::DEBUG_FLAGS
pub use debug::DEBUG_FLAGS;

pub mod persistence;
pub mod plot;
pub mod run;

// Re-export commonly used items
pub use analysis::ANALYSIS;
pub use binance::BINANCE;
pub use persistence::PERSISTENCE;
pub use plot::PLOT;
pub use run::{RunConfig, RunMode};
