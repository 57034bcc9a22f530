//! Command-line arguments for the watchlist client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use watchlist_common::net::{COMMAND_PORT, addr};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Address of the watchlist server's command channel.
    #[arg(long, env = "WATCHLIST_SERVER", default_value_t = addr("127.0.0.1", COMMAND_PORT))]
    pub server: String,

    /// What to do.
    #[command(subcommand)]
    pub action: Action,
}

/// Client actions.
#[derive(Debug, Subcommand)]
pub enum Action {
    /// Show the current quote of every watched symbol.
    List {
        /// Show the change in dollars or in percent.
        #[arg(long, value_enum, default_value_t = ChangeUnits::Dollars)]
        units: ChangeUnits,
    },
    /// Start watching a symbol.
    Add {
        /// Ticker symbol, any case.
        symbol: String,
    },
    /// Stop watching a symbol.
    Remove {
        /// Ticker symbol, any case.
        symbol: String,
    },
    /// Refresh every watched symbol now.
    Refresh,
    /// Seed the default symbols if the watchlist is empty.
    Init,
    /// Show every stored quote of one symbol, newest first.
    History {
        /// Ticker symbol, any case.
        symbol: String,
    },
    /// Add every symbol listed in a file.
    /// Symbols may be separated by commas, spaces, or new lines.
    Import {
        /// Path to the symbols file.
        path: PathBuf,
    },
}

/// How the change column is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChangeUnits {
    /// Absolute change, e.g. `+1.25`.
    Dollars,
    /// Relative change, e.g. `+0.98%`.
    Percent,
}
