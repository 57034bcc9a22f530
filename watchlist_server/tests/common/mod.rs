//! Shared fixtures for the integration tests: a scripted quote source and helpers to
//! start a dispatcher around a memory store.
#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use watchlist_common::{FetchError, FetchedQuote, QuoteRecord, Symbol};
use watchlist_server::dispatcher::Pipeline;
use watchlist_server::{
    Dispatcher, FetchReport, ManualConnectivity, MemoryStore, QuoteFetcher, QuoteStore,
    Reconciler,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn sym(s: &str) -> Symbol {
    Symbol::parse(s).expect("symbol")
}

pub fn symbols(list: &[&str]) -> BTreeSet<Symbol> {
    list.iter().map(|s| sym(s)).collect()
}

/// Pause point inside one `fetch` call.
pub struct Gate {
    /// Signals that the fetch has started.
    pub entered: Receiver<()>,
    /// Send (or drop) to let the fetch return.
    pub release: Sender<()>,
}

/// Quote source answering from a fixed table of known symbols.
///
/// Every call is recorded. Unknown symbols come back as invalid, a configured failure
/// is returned instead of quotes, and `block_next` pauses the next call.
pub struct ScriptedFetcher {
    known: Mutex<BTreeMap<Symbol, f64>>,
    failure: Mutex<Option<FetchError>>,
    calls: Mutex<Vec<BTreeSet<Symbol>>>,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl ScriptedFetcher {
    pub fn new(known: &[(&str, f64)]) -> Self {
        Self {
            known: Mutex::new(known.iter().map(|(s, bid)| (sym(s), *bid)).collect()),
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// Knows the default seed plus NFLX.
    pub fn market() -> Self {
        Self::new(&[
            ("AAPL", 189.5),
            ("GOOG", 141.2),
            ("MSFT", 410.25),
            ("NFLX", 601.0),
        ])
    }

    pub fn set_price(&self, symbol: &str, bid: f64) {
        self.known.lock().insert(sym(symbol), bid);
    }

    pub fn fail_with(&self, failure: Option<FetchError>) {
        *self.failure.lock() = failure;
    }

    pub fn calls(&self) -> Vec<BTreeSet<Symbol>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn block_next(&self) -> Gate {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        *self.gate.lock() = Some((entered_tx, release_rx));
        Gate {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl QuoteFetcher for ScriptedFetcher {
    fn fetch(&self, symbols: &BTreeSet<Symbol>) -> Result<FetchReport, FetchError> {
        self.calls.lock().push(symbols.clone());
        let gate = self.gate.lock().take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.recv_timeout(WAIT);
        }
        if let Some(failure) = self.failure.lock().clone() {
            return Err(failure);
        }

        let known = self.known.lock();
        let mut report = FetchReport::default();
        for symbol in symbols {
            match known.get(symbol) {
                Some(bid) => report.quotes.push(FetchedQuote {
                    symbol: symbol.clone(),
                    bid_price: *bid,
                    change: 1.25,
                    percent_change: 0.5,
                }),
                None => report.invalid.push(symbol.clone()),
            }
        }
        Ok(report)
    }
}

/// A running dispatcher and the collaborators the tests poke at.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub network: Arc<ManualConnectivity>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn start(rows: Vec<QuoteRecord>) -> Self {
        Self::with_store(Arc::new(MemoryStore::with_rows(rows, 10)))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        let fetcher = Arc::new(ScriptedFetcher::market());
        let network = Arc::new(ManualConnectivity::new(true));
        let dispatcher = Dispatcher::start(Pipeline::new(
            store.clone(),
            fetcher.clone(),
            network.clone(),
            Reconciler::default(),
        ))
        .expect("dispatcher");
        Self {
            store,
            fetcher,
            network,
            dispatcher,
        }
    }

    pub fn current_symbols(&self) -> Vec<String> {
        self.store
            .current()
            .iter()
            .map(|r| r.symbol.to_string())
            .collect()
    }

    pub fn current_count(&self, symbol: &str) -> usize {
        let symbol = sym(symbol);
        self.store
            .rows()
            .iter()
            .filter(|r| r.symbol == symbol && r.is_current)
            .count()
    }
}

/// A current row for `symbol` as if fetched at some earlier time.
pub fn stored(symbol: &str, bid: f64) -> QuoteRecord {
    QuoteRecord {
        symbol: sym(symbol),
        bid_price: bid,
        change: -0.5,
        percent_change: -0.25,
        is_up: false,
        as_of: chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp"),
        is_current: true,
    }
}
