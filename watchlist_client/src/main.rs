//! Watchlist Client — a command-line front end for the watchlist server. Each
//! invocation sends one command over TCP, prints the reply and exits.
//!
//! Usage example (CLI):
//! ```bash
//! watchlist_client add nflx
//! watchlist_client list --units percent
//! watchlist_client import ./symbols.txt
//! ```
//!
//! The symbols file for `import` may separate symbols with commas, spaces, or new lines.
//! See `watchlist_common::symbol` for details.
#![warn(missing_docs)]
mod args;
mod render;
mod sender;

use crate::args::{Action, Args, ChangeUnits};
use crate::render::{notification, quote_table};
use crate::sender::CommandSender;
use clap::Parser;
use log::{error, info};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use watchlist_common::symbol::SymbolParser;
use watchlist_common::{Command, MutationRequest, Reply, Result, Symbol, WatchlistError};

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let sender = CommandSender::new(args.server.trim());

    if let Err(e) = run(&sender, args.action) {
        error!("{}", e);
        return Err(e);
    }
    Ok(())
}

fn run(sender: &CommandSender, action: Action) -> Result<()> {
    match action {
        Action::List { units } => list(sender, Command::List, units),
        Action::History { symbol } => {
            list(sender, Command::History(Symbol::parse(&symbol)?), ChangeUnits::Dollars)
        }
        Action::Add { symbol } => dispatch(sender, MutationRequest::Add(Symbol::parse(&symbol)?)),
        Action::Remove { symbol } => {
            dispatch(sender, MutationRequest::Delete(Symbol::parse(&symbol)?))
        }
        Action::Refresh => dispatch(sender, MutationRequest::PeriodicRefresh),
        Action::Init => dispatch(sender, MutationRequest::Init),
        Action::Import { path } => import(sender, &path),
    }
}

fn list(sender: &CommandSender, command: Command, units: ChangeUnits) -> Result<()> {
    match sender.send(&command)? {
        Reply::Quotes(quotes) => {
            print!("{}", quote_table(&quotes, units));
            Ok(())
        }
        other => unexpected(other),
    }
}

fn dispatch(sender: &CommandSender, request: MutationRequest) -> Result<()> {
    info!("Dispatching {}", request);
    match sender.send(&Command::Dispatch(request))? {
        Reply::Outcome(outcome) => {
            println!("{}", notification(&outcome));
            Ok(())
        }
        other => unexpected(other),
    }
}

fn import(sender: &CommandSender, path: &Path) -> Result<()> {
    let file = File::open(path)?;
    let symbols = Symbol::parse_from_file(BufReader::new(file))?;
    info!("Importing {} symbols from {}", symbols.len(), path.display());
    for symbol in symbols {
        print!("{}: ", symbol);
        dispatch(sender, MutationRequest::Add(symbol))?;
    }
    Ok(())
}

fn unexpected(reply: Reply) -> Result<()> {
    match reply {
        Reply::Error(message) => Err(WatchlistError::Format(format!("server error: {message}"))),
        other => Err(WatchlistError::Format(format!("unexpected reply: {other:?}"))),
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();
}
