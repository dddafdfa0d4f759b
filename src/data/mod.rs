// Event loading and price retrieval
pub mod events;
pub mod timeseries;

// Re-export commonly used types
pub use events::{EventTable, RowError, load_events_csv, load_events_from_reader};
pub use timeseries::{
    BNAPIVersion, CsvVersion, PriceCollection, PriceSeriesProvider, fetch_price_collection,
};
