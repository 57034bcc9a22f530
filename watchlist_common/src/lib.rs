//!
//! Common types and utilities shared by the watchlist server and client.
//!
//! This crate aggregates:
//! - `error` — unified error type `WatchlistError`, the fetch taxonomy `FetchError` and
//!   the `Result<T, WatchlistError>` alias.
//! - `symbol` — normalized ticker symbols, the default seed set and file parsing helpers.
//! - `quote` — persisted `QuoteRecord` rows and raw `FetchedQuote` values.
//! - `request` — `MutationRequest` and the `DispatchOutcome` reported back to callers.
//! - `command` — line-delimited JSON commands exchanged between client and server.
//! - `net` — networking constants and small helpers.
#![warn(missing_docs)]
pub mod command;
pub mod error;
pub mod net;
pub mod quote;
pub mod request;
pub mod symbol;

pub use command::{Command, Reply};
pub use error::{FetchError, Result, WatchlistError};
pub use quote::{FetchedQuote, QuoteRecord};
pub use request::{ApplySummary, DispatchOutcome, FailureReason, MutationRequest, SkipReason};
pub use symbol::Symbol;
