use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{EventStudyError, Result};
use crate::models::{PriceSeries, ReturnSeries};

/// How one-period returns are measured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    /// (p[t] - p[t-1]) / p[t-1]
    #[default]
    Simple,
    /// ln(p[t] / p[t-1])
    Log,
}

/// Convert prices into one-period returns.
///
/// Entry `i` of the result is stamped with the timestamp of price `i + 1`,
/// so the output is exactly one shorter than the input.
pub fn to_returns(prices: &PriceSeries, kind: ReturnKind) -> Result<ReturnSeries> {
    if prices.len() < 2 {
        return Err(EventStudyError::InsufficientData {
            needed: 2,
            got: prices.len(),
        });
    }

    let returns: Vec<f64> = prices
        .prices()
        .windows(2)
        .map(|pair| match kind {
            ReturnKind::Simple => (pair[1] - pair[0]) / pair[0],
            ReturnKind::Log => (pair[1] / pair[0]).ln(),
        })
        .collect();
    let timestamps = prices.timestamps()[1..].to_vec();

    Ok(ReturnSeries::from_parts(
        prices.symbol.clone(),
        timestamps,
        returns,
    ))
}
