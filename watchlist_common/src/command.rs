//! Shared protocol types used by client and server.
//!
//! Each TCP connection carries exactly one exchange: the client writes a single
//! JSON-encoded `Command` terminated by a new line, the server answers with a single
//! JSON-encoded `Reply` line and closes the connection.
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::quote::QuoteRecord;
use crate::request::{DispatchOutcome, MutationRequest};
use crate::symbol::Symbol;

/// Request sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Run a mutation through the dispatcher and wait for its outcome.
    Dispatch(MutationRequest),
    /// Current quote of every watched symbol.
    List,
    /// Every stored row of one symbol, newest first.
    History(Symbol),
}

/// Answer sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Outcome of a `Command::Dispatch`.
    Outcome(DispatchOutcome),
    /// Rows for `Command::List` or `Command::History`.
    Quotes(Vec<QuoteRecord>),
    /// The command could not be decoded or served.
    Error(String),
}

/// Write `value` as one JSON line and flush.
pub fn write_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one JSON line into `T`.
pub fn read_line<R: BufRead, T: for<'de> Deserialize<'de>>(reader: &mut R) -> Result<T> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(serde_json::from_str(line.trim_end())?)
}
