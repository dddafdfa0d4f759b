use serde::{Deserialize, Serialize};

use crate::utils::TimeUtils;

/// A report-facing ticker (e.g. "BTC-USD") plus the bar interval it is sampled at.
#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub interval_ms: i64,
}

impl Symbol {
    pub fn new(name: &str, interval_ms: i64) -> Self {
        Self {
            name: name.trim().to_uppercase(),
            interval_ms,
        }
    }

    // Finds the quote at the end of the ticker and returns it.
    // Returns None if no matching quote is found.
    pub fn get_quote(text: &str) -> Option<&str> {
        static QUOTES: &[&str] = &["-USDT", "-USDC", "-USD", "-BTC", "-ETH", "USDT", "USDC", "FDUSD"];
        QUOTES
            .iter()
            .find(|&&ext| text.ends_with(ext) && text.len() > ext.len())
            .map(|ext| ext.trim_start_matches('-'))
    }

    pub fn get_base(text: &str) -> Option<&str> {
        let quote = Self::get_quote(text)?;
        text.strip_suffix(quote)
            .map(|base| base.strip_suffix('-').unwrap_or(base))
    }

    /// The name we pass to the Binance API. Yahoo-style USD tickers map onto
    /// the USDT books: "BTC-USD" -> "BTCUSDT", "ETH-BTC" -> "ETHBTC".
    pub fn exchange_name(&self) -> String {
        match (Self::get_base(&self.name), Self::get_quote(&self.name)) {
            (Some(base), Some("USD")) => format!("{}USDT", base),
            (Some(base), Some(quote)) => format!("{}{}", base, quote),
            _ => self.name.clone(),
        }
    }

    /// Filesystem-friendly form used for figure names
    pub fn file_stem(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} ({})",
            self.name,
            TimeUtils::interval_to_string(self.interval_ms)
        )
    }
}
