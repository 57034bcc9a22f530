//! Watchlist synchronization engine.
//!
//! The engine keeps the quotes of a small set of watched symbols fresh. Every trigger
//! (a client command, the periodic timer, the startup seed) produces one
//! `MutationRequest`, which is funneled through a single dispatcher worker:
//!
//! - `network` — connectivity check run before any work is planned.
//! - `model::reconciler` — turns a request plus the current watchlist into a fetch plan,
//!   and a fetch result into store writes.
//! - `fetcher` — batched remote quote request with a bounded wait.
//! - `model::store` — snapshot-based quote rows with an atomic commit, optionally
//!   persisted to a JSON file.
//! - `dispatcher` — serializes dispatch cycles, coalesces periodic refreshes and reports
//!   each outcome through a completion channel.
//! - `scheduler` — persisted, tag-keyed periodic registration plus the timer thread that
//!   raises `PeriodicRefresh`.
//! - `receiver` — TCP command channel used by the client.
#![warn(missing_docs)]
pub mod config;
pub mod dispatcher;
pub mod fetcher;
pub mod model;
pub mod network;
pub mod receiver;
pub mod scheduler;

pub use dispatcher::{DispatchEvent, DispatchHandle, Dispatcher};
pub use fetcher::{FetchReport, HttpQuoteFetcher, QuoteFetcher};
pub use model::reconciler::{FetchPlan, Reconciler};
pub use model::store::{JsonFileStore, MemoryStore, QuoteStore, StoreWrites, WatchlistSnapshot};
pub use network::{Connectivity, ManualConnectivity, TcpProbe};
pub use scheduler::{JobScheduler, PeriodicTask, PERIODIC_TAG};
