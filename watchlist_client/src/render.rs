//! Text rendering of replies: the quote table and one-line notifications.
use crate::args::ChangeUnits;
use watchlist_common::{DispatchOutcome, FailureReason, FetchError, QuoteRecord, SkipReason};

/// Message shown when the network is down.
pub const NETWORK_TOAST: &str = "Network unavailable, try again later";

/// Message shown when adding a symbol that is already watched.
pub const ALREADY_SAVED: &str = "This stock is already saved!";

/// Render quotes as an aligned table; `units` picks the change column.
pub fn quote_table(quotes: &[QuoteRecord], units: ChangeUnits) -> String {
    if quotes.is_empty() {
        return "No stocks in the watchlist".to_string();
    }
    let mut out = format!("{:<12} {:>12} {:>10}  {}\n", "SYMBOL", "BID", "CHANGE", "AS OF");
    for quote in quotes {
        let change = match units {
            ChangeUnits::Dollars => quote.signed_change(),
            ChangeUnits::Percent => quote.signed_percent_change(),
        };
        let arrow = if quote.is_up { '▲' } else { '▼' };
        let marker = if quote.is_current { "" } else { "  (history)" };
        out.push_str(&format!(
            "{:<12} {:>12.2} {:>9}{}  {}{}\n",
            quote.symbol,
            quote.bid_price,
            change,
            arrow,
            quote.as_of.format("%Y-%m-%d %H:%M:%S UTC"),
            marker
        ));
    }
    out
}

/// One-line notification for a dispatch outcome.
pub fn notification(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Applied(summary) => {
            let mut parts = Vec::new();
            if !summary.refreshed.is_empty() {
                parts.push(format!("updated {}", join(&summary.refreshed)));
            }
            if !summary.invalid.is_empty() {
                parts.push(format!("unknown symbol {}", join(&summary.invalid)));
            }
            if summary.removed > 0 {
                parts.push(format!("removed {} quotes", summary.removed));
            }
            if parts.is_empty() {
                "Done".to_string()
            } else {
                capitalize(&parts.join("; "))
            }
        }
        DispatchOutcome::NoOpAlreadyPresent(_) => ALREADY_SAVED.to_string(),
        DispatchOutcome::Unchanged => "Nothing to update".to_string(),
        DispatchOutcome::Skipped(SkipReason::NetworkUnavailable) => NETWORK_TOAST.to_string(),
        DispatchOutcome::Failed(FailureReason::Fetch(FetchError::Timeout(_))) => {
            "Quote service timed out; will retry on the next refresh".to_string()
        }
        DispatchOutcome::Failed(reason) => format!("Update failed: {reason}"),
        DispatchOutcome::Superseded => "Replaced by a newer refresh".to_string(),
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use watchlist_common::{ApplySummary, Symbol};

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).expect("symbol")
    }

    fn record(change: f64, percent_change: f64) -> QuoteRecord {
        QuoteRecord {
            symbol: sym("AAPL"),
            bid_price: 189.5,
            change,
            percent_change,
            is_up: change >= 0.0,
            as_of: Utc.with_ymd_and_hms(2026, 3, 4, 14, 30, 0).unwrap(),
            is_current: true,
        }
    }

    #[test]
    fn table_switches_units() {
        let quotes = vec![record(-1.5, -0.75)];
        let dollars = quote_table(&quotes, ChangeUnits::Dollars);
        assert!(dollars.contains("-1.50▼"), "{dollars}");
        let percent = quote_table(&quotes, ChangeUnits::Percent);
        assert!(percent.contains("-0.75%▼"), "{percent}");
        assert!(percent.contains("2026-03-04 14:30:00 UTC"));
    }

    #[test]
    fn empty_table_has_a_message() {
        assert_eq!(quote_table(&[], ChangeUnits::Dollars), "No stocks in the watchlist");
    }

    #[test]
    fn notifications_match_outcomes() {
        assert_eq!(
            notification(&DispatchOutcome::NoOpAlreadyPresent(sym("AAPL"))),
            ALREADY_SAVED
        );
        assert_eq!(
            notification(&DispatchOutcome::Skipped(SkipReason::NetworkUnavailable)),
            NETWORK_TOAST
        );
        let applied = DispatchOutcome::Applied(ApplySummary {
            refreshed: vec![sym("AAPL"), sym("GOOG")],
            invalid: vec![sym("GOGL")],
            removed: 0,
        });
        assert_eq!(
            notification(&applied),
            "Updated AAPL, GOOG; unknown symbol GOGL"
        );
    }
}
