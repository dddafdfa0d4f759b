pub mod core;
pub mod state;

// Re-export key components
pub use core::StudyEngine;
pub use state::{RunSummary, SkippedEvent, SkippedSymbol, StudyOutput, SymbolRanking};
