//! Ticker symbols and helpers shared between client and server.
//!
//! A `Symbol` is always stored normalized (trimmed, upper-case), so plain equality
//! is the case-insensitive comparison the watchlist deduplicates on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::WatchlistError;

/// Longest accepted ticker, exchange suffix included (e.g. `BRK-B`, `RDS.A`, `^GSPC`).
pub const MAX_SYMBOL_LEN: usize = 12;

/// Normalized ticker symbol; the uniqueness key of the watchlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Normalize free-text input into a `Symbol`.
    pub fn parse(raw: &str) -> Result<Self, WatchlistError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let valid_chars = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if normalized.is_empty() || normalized.len() > MAX_SYMBOL_LEN || !valid_chars {
            return Err(WatchlistError::InvalidSymbol(raw.to_string()));
        }
        Ok(Symbol(normalized))
    }

    /// The normalized ticker text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = WatchlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = WatchlistError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Symbols seeded into an empty watchlist on first start.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Display, EnumIter, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum DefaultSymbol {
    AAPL,
    GOOG,
    MSFT,
}

impl DefaultSymbol {
    /// The default seed set as normalized symbols.
    pub fn seed() -> Vec<Symbol> {
        DefaultSymbol::iter()
            .map(|s| Symbol(s.to_string()))
            .collect()
    }
}

/// Trait providing file parsing for symbols.
pub trait SymbolParser: Sized {
    /// Parses symbols from a buffered reader.
    ///
    /// Symbols may be separated by commas, whitespace or new lines. Blank entries are
    /// skipped and repeated symbols (in any case) are kept once, in first-seen order.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, WatchlistError>;
}

impl SymbolParser for Symbol {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, WatchlistError> {
        let mut symbols: Vec<Symbol> = Vec::new();

        for line_result in reader.lines() {
            let line = line_result?;
            for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
                if token.is_empty() {
                    continue;
                }
                let symbol = Symbol::parse(token)
                    .map_err(|e| WatchlistError::ParseSymbolsFile(e.to_string()))?;
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let symbol = Symbol::parse("  aapl \n").expect("symbol");
        assert_eq!(symbol.as_str(), "AAPL");
        assert_eq!(symbol, Symbol::parse("AAPL").expect("symbol"));
    }

    #[test]
    fn parse_accepts_exchange_suffixes() {
        for raw in ["brk-b", "rds.a", "^gspc", "eurusd=x"] {
            assert!(Symbol::parse(raw).is_ok(), "{raw} should be accepted");
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        for raw in ["", "   ", "AA PL", "AAPL;DROP", "ABCDEFGHIJKLM"] {
            assert!(
                matches!(Symbol::parse(raw), Err(WatchlistError::InvalidSymbol(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn serde_goes_through_normalization() {
        let symbol: Symbol = serde_json::from_str("\"goog\"").expect("decode");
        assert_eq!(symbol.as_str(), "GOOG");
        assert!(serde_json::from_str::<Symbol>("\"not a ticker\"").is_err());
    }

    #[test]
    fn default_seed_is_aapl_goog_msft() {
        let seed: Vec<String> = DefaultSymbol::seed().into_iter().map(String::from).collect();
        assert_eq!(seed, vec!["AAPL", "GOOG", "MSFT"]);
    }

    #[test]
    fn parse_from_file_splits_and_dedups() {
        let input = Cursor::new("aapl, msft\n\nGOOG  AAPL\n");
        let symbols = Symbol::parse_from_file(input).expect("parse");
        let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["AAPL", "MSFT", "GOOG"]);
    }

    #[test]
    fn parse_from_file_reports_bad_entry() {
        let input = Cursor::new("AAPL\nnot/valid\n");
        assert!(matches!(
            Symbol::parse_from_file(input),
            Err(WatchlistError::ParseSymbolsFile(_))
        ));
    }
}
