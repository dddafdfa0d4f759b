//! Event table loader.
//!
//! Reads the curated event CSV (`event_id, ts_utc, symbol, category, headline,
//! source, direction`). A missing required column fails the whole file; a bad
//! row is rejected on its own and reported with its line number.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};

#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
use crate::domain::{Direction, Event};
use crate::error::{EventStudyError, Result};
use crate::utils::time_utils;

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "event_id", "ts_utc", "symbol", "category", "headline", "source", "direction",
];
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Deserialize)]
struct RawEventRow {
    event_id: String,
    ts_utc: String,
    symbol: String,
    category: String,
    headline: String,
    source: String,
    direction: String,
}

/// A row that did not make it into the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based line in the file (the header is line 1)
    pub line: u64,
    pub event_id: Option<String>,
    pub message: String,
}

/// Events sorted by timestamp, plus the rows that were rejected.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    pub events: Vec<Event>,
    pub rejected: Vec<RowError>,
}

pub fn load_events_csv(path: &Path) -> Result<EventTable> {
    let file = File::open(path)?;
    let table = load_events_from_reader(file)?;
    log::info!(
        "Loaded {} events from {} ({} rows rejected)",
        table.events.len(),
        path.display(),
        table.rejected.len()
    );
    Ok(table)
}

pub fn load_events_from_reader<R: Read>(reader: R) -> Result<EventTable> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    check_columns(&headers)?;

    let mut table = EventTable::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (idx, record) in rdr.records().enumerate() {
        // Header is line 1; fall back to the row count when the reader has no position
        let fallback_line = idx as u64 + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                reject(&mut table, fallback_line, None, e.to_string());
                continue;
            }
        };
        let line = record.position().map_or(fallback_line, |p| p.line());

        let row: RawEventRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                reject(&mut table, line, None, e.to_string());
                continue;
            }
        };

        match row_to_event(row, line) {
            Ok(event) => {
                if !seen_ids.insert(event.id.clone()) {
                    reject(
                        &mut table,
                        line,
                        Some(event.id.clone()),
                        format!("duplicate event_id {}", event.id),
                    );
                    continue;
                }
                table.events.push(event);
            }
            Err(rejected) => reject(&mut table, rejected.line, rejected.event_id, rejected.message),
        }
    }

    // Stable: equal timestamps keep file order
    table.events.sort_by_key(|e| e.timestamp);

    if !table.rejected.is_empty() {
        log::warn!("⚠️  {} event rows rejected", table.rejected.len());
    }
    Ok(table)
}

fn check_columns(headers: &StringRecord) -> Result<()> {
    let present: HashSet<&str> = headers.iter().collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !present.contains(*c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EventStudyError::MissingColumns(missing))
    }
}

fn row_to_event(row: RawEventRow, line: u64) -> std::result::Result<Event, RowError> {
    let fail = |event_id: Option<String>, message: String| RowError {
        line,
        event_id,
        message,
    };

    if row.event_id.is_empty() {
        return Err(fail(None, "empty event_id".to_string()));
    }
    let id = row.event_id;
    if row.symbol.is_empty() {
        return Err(fail(Some(id), "empty symbol".to_string()));
    }
    let Some(timestamp) = time_utils::parse_utc_timestamp(&row.ts_utc) else {
        return Err(fail(Some(id), format!("unparseable ts_utc '{}'", row.ts_utc)));
    };

    let (direction, recognised) = Direction::parse_lenient(&row.direction);
    if !recognised {
        log::warn!(
            "line {}: event {} has direction '{}', treating as neutral",
            line,
            id,
            row.direction
        );
    }

    let category = if row.category.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        row.category
    };

    Ok(Event {
        id,
        timestamp,
        symbol: row.symbol.to_uppercase(),
        category,
        headline: row.headline,
        source: row.source,
        direction,
    })
}

fn reject(table: &mut EventTable, line: u64, event_id: Option<String>, message: String) {
    #[cfg(debug_assertions)]
    if DEBUG_FLAGS.print_rejected_rows {
        log::warn!("line {}: rejected event row: {}", line, message);
    }
    table.rejected.push(RowError {
        line,
        event_id,
        message,
    });
}
