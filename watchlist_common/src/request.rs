//! Mutation requests and their outcomes.
//!
//! A `MutationRequest` is raised by a trigger (client command, periodic timer, startup)
//! and consumed exactly once by the dispatcher. The dispatcher answers every request
//! with a `DispatchOutcome`; failures never escape as errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::Display;

use crate::error::FetchError;
use crate::symbol::Symbol;

/// Work item for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationRequest {
    /// Seed the default watchlist if it is empty.
    Init,
    /// Start watching a symbol.
    Add(Symbol),
    /// Refresh every watched symbol.
    PeriodicRefresh,
    /// Stop watching a symbol and drop its history.
    Delete(Symbol),
}

impl fmt::Display for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationRequest::Init => f.write_str("Init"),
            MutationRequest::Add(symbol) => write!(f, "Add({symbol})"),
            MutationRequest::PeriodicRefresh => f.write_str("PeriodicRefresh"),
            MutationRequest::Delete(symbol) => write!(f, "Delete({symbol})"),
        }
    }
}

/// What a successful apply changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    /// Symbols that received a new current record.
    pub refreshed: Vec<Symbol>,
    /// Symbols the remote reported as unknown; none of them is current afterwards.
    pub invalid: Vec<Symbol>,
    /// Rows deleted (Delete only).
    pub removed: usize,
}

/// Why a dispatch was skipped before doing any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum SkipReason {
    /// No connectivity when the dispatch started.
    NetworkUnavailable,
}

/// Why a dispatch failed after planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The remote fetch failed; nothing was written.
    Fetch(FetchError),
    /// The store rejected the commit; nothing was written.
    Store(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Fetch(err) => write!(f, "{err}"),
            FailureReason::Store(msg) => write!(f, "store: {msg}"),
        }
    }
}

/// Result of one dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    /// Writes were committed.
    Applied(ApplySummary),
    /// `Add` of a symbol that is already watched.
    NoOpAlreadyPresent(Symbol),
    /// Nothing to do: `Init` on a populated watchlist or a refresh of an empty one.
    Unchanged,
    /// The cycle was aborted before planning.
    Skipped(SkipReason),
    /// The fetch or the commit failed; the store is unchanged.
    Failed(FailureReason),
    /// A newer refresh replaced this one while it was fetching; nothing was written.
    Superseded,
}

impl DispatchOutcome {
    /// Whether the store may have changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, DispatchOutcome::Applied(_))
    }
}
