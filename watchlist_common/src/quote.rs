//! Quote data model.
//!
//! A `FetchedQuote` is what the remote quote API returns for one symbol. A `QuoteRecord`
//! is the persisted row built from it: the same figures plus the `as_of` time of the
//! fetch cycle and the `is_current` marker. Only one record per symbol is current at
//! steady state; older ones stay around as history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// Price data for one symbol as returned by the remote quote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedQuote {
    /// Symbol the figures belong to.
    pub symbol: Symbol,
    /// Current bid price.
    pub bid_price: f64,
    /// Absolute change since the previous close.
    pub change: f64,
    /// Change since the previous close, in percent.
    pub percent_change: f64,
}

/// Persisted quote row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Symbol identifier.
    pub symbol: Symbol,
    /// Bid price at `as_of`.
    pub bid_price: f64,
    /// Absolute change since the previous close.
    pub change: f64,
    /// Change since the previous close, in percent.
    pub percent_change: f64,
    /// `true` when `change` is not negative.
    pub is_up: bool,
    /// Time of the fetch cycle that produced this row.
    pub as_of: DateTime<Utc>,
    /// Whether this row is the one shown for `symbol`.
    pub is_current: bool,
}

impl QuoteRecord {
    /// Build a new current row from a fetched quote.
    pub fn current(quote: &FetchedQuote, as_of: DateTime<Utc>) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            bid_price: quote.bid_price,
            change: quote.change,
            percent_change: quote.percent_change,
            is_up: quote.change >= 0.0,
            as_of,
            is_current: true,
        }
    }

    /// Change formatted with an explicit sign, e.g. `+1.25` or `-0.40`.
    pub fn signed_change(&self) -> String {
        format!("{:+.2}", self.change)
    }

    /// Percent change formatted with an explicit sign, e.g. `+0.98%`.
    pub fn signed_percent_change(&self) -> String {
        format!("{:+.2}%", self.percent_change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(change: f64) -> FetchedQuote {
        FetchedQuote {
            symbol: Symbol::parse("MSFT").expect("symbol"),
            bid_price: 410.25,
            change,
            percent_change: change / 4.1,
        }
    }

    #[test]
    fn current_row_tracks_direction() {
        let now = Utc::now();
        assert!(QuoteRecord::current(&fetched(1.5), now).is_up);
        assert!(QuoteRecord::current(&fetched(0.0), now).is_up);
        let down = QuoteRecord::current(&fetched(-2.0), now);
        assert!(!down.is_up);
        assert!(down.is_current);
        assert_eq!(down.as_of, now);
    }

    #[test]
    fn signed_formatting() {
        let row = QuoteRecord::current(&fetched(-0.4), Utc::now());
        assert_eq!(row.signed_change(), "-0.40");
        let row = QuoteRecord::current(&fetched(4.1), Utc::now());
        assert_eq!(row.signed_change(), "+4.10");
        assert_eq!(row.signed_percent_change(), "+1.00%");
    }
}
