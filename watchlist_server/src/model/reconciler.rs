//! Planning and write computation for mutation requests.
//!
//! The reconciler is pure: it never touches the store or the network. `plan` decides
//! which symbols a request needs fetched, and `apply` turns a successful fetch into the
//! `StoreWrites` the dispatcher commits.
//!
//! An `Add` refreshes the whole watchlist together with the new symbol, so after any
//! successful `Add` every watched symbol shares the same `as_of`.

use crate::fetcher::FetchReport;
use crate::model::store::{StoreWrites, WatchlistSnapshot};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use watchlist_common::symbol::DefaultSymbol;
use watchlist_common::{MutationRequest, QuoteRecord, Symbol};

/// What a dispatch cycle has to do for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Fetch these symbols and make the results current.
    Fetch(BTreeSet<Symbol>),
    /// Delete every row of this symbol; no fetch.
    Remove(Symbol),
    /// `Add` of a symbol that is already watched.
    AlreadyPresent(Symbol),
    /// Nothing to fetch or write.
    Nothing,
}

impl FetchPlan {
    /// Whether the plan needs no network call and no write.
    pub fn is_empty(&self) -> bool {
        matches!(self, FetchPlan::AlreadyPresent(_) | FetchPlan::Nothing)
    }
}

/// Computes fetch plans and store writes.
#[derive(Debug, Clone)]
pub struct Reconciler {
    seed: Vec<Symbol>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DefaultSymbol::seed())
    }
}

impl Reconciler {
    /// Reconciler seeding an empty watchlist with `seed` on `Init`.
    pub fn new(seed: Vec<Symbol>) -> Self {
        Self { seed }
    }

    /// Decide what `request` requires given the currently watched symbols.
    pub fn plan(&self, request: &MutationRequest, snapshot: &WatchlistSnapshot) -> FetchPlan {
        match request {
            MutationRequest::Init if snapshot.is_empty() && !self.seed.is_empty() => {
                FetchPlan::Fetch(self.seed.iter().cloned().collect())
            }
            MutationRequest::Init => FetchPlan::Nothing,
            MutationRequest::Add(symbol) if snapshot.contains(symbol) => {
                FetchPlan::AlreadyPresent(symbol.clone())
            }
            MutationRequest::Add(symbol) => {
                let mut symbols = snapshot.clone();
                symbols.insert(symbol.clone());
                FetchPlan::Fetch(symbols)
            }
            MutationRequest::PeriodicRefresh if snapshot.is_empty() => FetchPlan::Nothing,
            MutationRequest::PeriodicRefresh => FetchPlan::Fetch(snapshot.clone()),
            MutationRequest::Delete(symbol) => FetchPlan::Remove(symbol.clone()),
        }
    }

    /// Store writes for a successful fetch of `requested`.
    ///
    /// Quotes for symbols that were not requested are ignored, as are repeated quotes
    /// for the same symbol after the first. Requested symbols the remote flagged invalid
    /// are retired; requested symbols the remote did not mention are left untouched.
    pub fn apply(
        &self,
        report: &FetchReport,
        requested: &BTreeSet<Symbol>,
        as_of: DateTime<Utc>,
    ) -> StoreWrites {
        let mut writes = StoreWrites::default();
        let mut seen: BTreeSet<&Symbol> = BTreeSet::new();
        for quote in &report.quotes {
            if requested.contains(&quote.symbol) && seen.insert(&quote.symbol) {
                writes.insert.push(QuoteRecord::current(quote, as_of));
            }
        }
        for symbol in &report.invalid {
            if requested.contains(symbol)
                && !seen.contains(symbol)
                && !writes.retire.contains(symbol)
            {
                writes.retire.push(symbol.clone());
            }
        }
        writes
    }

    /// Store writes for `Delete(symbol)`.
    pub fn removal(&self, symbol: &Symbol) -> StoreWrites {
        StoreWrites {
            remove: vec![symbol.clone()],
            ..StoreWrites::default()
        }
    }
}
