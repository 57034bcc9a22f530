//! Remote quote retrieval.
//!
//! `QuoteFetcher` is the seam between the dispatcher and the remote quote API. The HTTP
//! implementation sends every requested symbol in one `GET {url}?symbols=A,B,C` and
//! expects a body shaped like
//!
//! ```json
//! {"quotes":[{"symbol":"AAPL","bid":189.5,"change":-1.2,"change_percent":-0.63}]}
//! ```
//!
//! A quote whose `bid` is `null` means the remote does not know the symbol. There is no
//! retry here; a failed cycle is retried by the next trigger.

use log::{debug, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use watchlist_common::{FetchError, FetchedQuote, Symbol, WatchlistError};

/// Parsed response of one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Quotes in response order.
    pub quotes: Vec<FetchedQuote>,
    /// Symbols the remote explicitly reported as unknown.
    pub invalid: Vec<Symbol>,
}

/// Source of current quotes.
pub trait QuoteFetcher: Send + Sync {
    /// Fetch quotes for `symbols`. An empty set returns an empty report without any
    /// network traffic.
    fn fetch(&self, symbols: &BTreeSet<Symbol>) -> Result<FetchReport, FetchError>;
}

#[derive(Debug, Deserialize)]
struct QuotesPayload {
    quotes: Vec<RemoteQuote>,
}

#[derive(Debug, Deserialize)]
struct RemoteQuote {
    symbol: String,
    bid: Option<f64>,
    change: Option<f64>,
    change_percent: Option<f64>,
}

/// Decode a quote response body.
pub fn decode_quotes(body: &[u8]) -> Result<FetchReport, FetchError> {
    let payload: QuotesPayload =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut report = FetchReport::default();
    for remote in payload.quotes {
        let symbol = match Symbol::parse(&remote.symbol) {
            Ok(symbol) => symbol,
            Err(_) => {
                warn!("Ignoring quote with unusable symbol {:?}", remote.symbol);
                continue;
            }
        };
        match remote.bid {
            Some(bid_price) => report.quotes.push(FetchedQuote {
                symbol,
                bid_price,
                change: remote.change.unwrap_or(0.0),
                percent_change: remote.change_percent.unwrap_or(0.0),
            }),
            None => report.invalid.push(symbol),
        }
    }
    Ok(report)
}

/// `QuoteFetcher` backed by a blocking HTTP client.
pub struct HttpQuoteFetcher {
    url: String,
    timeout_ms: u64,
    client: Client,
}

impl HttpQuoteFetcher {
    /// Build a fetcher for `url` whose requests give up after `timeout_ms`.
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Result<Self, WatchlistError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| WatchlistError::Format(format!("failed to build http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            timeout_ms,
            client,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout_ms)
        } else if err.is_connect() {
            FetchError::NetworkUnavailable(err.to_string())
        } else if err.is_decode() || err.is_body() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Remote {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

impl QuoteFetcher for HttpQuoteFetcher {
    fn fetch(&self, symbols: &BTreeSet<Symbol>) -> Result<FetchReport, FetchError> {
        if symbols.is_empty() {
            return Ok(FetchReport::default());
        }
        let joined = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");
        debug!("Requesting quotes for {}", joined);

        let response = self
            .client
            .get(&self.url)
            .query(&[("symbols", joined.as_str())])
            .send()
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(FetchError::Remote {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body = response.bytes().map_err(|e| self.classify(e))?;
        let report = decode_quotes(&body)?;
        debug!(
            "Received {} quotes, {} invalid symbols",
            report.quotes.len(),
            report.invalid.len()
        );
        Ok(report)
    }
}
