//! Error types shared between client and server.
//!
//! `WatchlistError` unifies I/O, serialization, channel and locking failures so
//! crates can propagate a single error type with `?`. `FetchError` is the narrower
//! taxonomy of a failed remote quote request; it is serializable because it travels
//! back to clients inside a `DispatchOutcome`.
use std::io;
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type shared by client and server.
#[derive(Error, Debug)]
pub enum WatchlistError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// A ticker symbol failed normalization.
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// Error while parsing a symbols file.
    #[error("Parse symbols file error: {0}")]
    ParseSymbolsFile(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Persisting or loading store state failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Crossbeam/channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Crossbeam/channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for WatchlistError {
    fn from(err: PoisonError<T>) -> Self {
        WatchlistError::MutexLock(err.to_string())
    }
}

/// Why a remote quote request produced no usable data.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchError {
    /// The remote host could not be reached at all.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The remote answered with a non-success status.
    #[error("remote error: status {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Body excerpt or transport message.
        message: String,
    },

    /// The payload could not be decoded.
    #[error("malformed quote payload: {0}")]
    Parse(String),

    /// The bounded wait on the remote call elapsed.
    #[error("quote request timed out after {0} ms")]
    Timeout(u64),
}

/// Workspace-wide `Result` alias with `WatchlistError` as the default error.
pub type Result<T, E = WatchlistError> = std::result::Result<T, E>;
