use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Expected sign of an event's price impact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Direction {
    #[strum(to_string = "positive", serialize = "pos")]
    Positive,
    #[strum(to_string = "negative", serialize = "neg")]
    Negative,
    #[strum(to_string = "neutral", serialize = "neu")]
    Neutral,
}

impl Direction {
    /// Lenient parse used by the event loader: unknown values become Neutral.
    /// Returns the direction plus whether the input was recognised.
    pub fn parse_lenient(text: &str) -> (Direction, bool) {
        match text.trim().parse::<Direction>() {
            Ok(direction) => (direction, true),
            Err(_) => (Direction::Neutral, false),
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            Direction::Positive => "pos",
            Direction::Negative => "neg",
            Direction::Neutral => "neutral",
        }
    }
}

/// A curated market event. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub category: String,
    pub headline: String,
    pub source: String,
    pub direction: Direction,
}
