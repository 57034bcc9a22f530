//! Command-line and environment configuration of the server.
//!
//! Every flag can also be supplied through the matching `WATCHLIST_*` environment
//! variable. See `main` for how the values are wired together.
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use watchlist_common::net::{
    COMMAND_PORT, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_QUOTE_URL, DEFAULT_REFRESH_INTERVAL_SECS,
    DEFAULT_REFRESH_TOLERANCE_SECS, addr, host_port,
};

use crate::model::store::DEFAULT_HISTORY_LIMIT;

/// Parsed server configuration.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Watchlist synchronization server", long_about = None)]
pub struct ServerConfig {
    /// Address of the command channel.
    #[arg(long, env = "WATCHLIST_BIND", default_value_t = addr("127.0.0.1", COMMAND_PORT))]
    pub bind: String,

    /// Directory holding `quotes.json` and `schedule.json`.
    #[arg(long, env = "WATCHLIST_DATA_DIR", default_value = "./watchlist-data")]
    pub data_dir: PathBuf,

    /// Remote quote endpoint.
    #[arg(long, env = "WATCHLIST_QUOTE_URL", default_value = DEFAULT_QUOTE_URL)]
    pub quote_url: String,

    /// Bounded wait on one remote quote request, in milliseconds.
    #[arg(long, env = "WATCHLIST_FETCH_TIMEOUT_MS", default_value_t = DEFAULT_FETCH_TIMEOUT_MS)]
    pub fetch_timeout_ms: u64,

    /// Period of the background refresh, in seconds.
    #[arg(long, env = "WATCHLIST_REFRESH_INTERVAL_SECS", default_value_t = DEFAULT_REFRESH_INTERVAL_SECS)]
    pub refresh_interval_secs: u64,

    /// Scheduling tolerance of the background refresh, in seconds.
    #[arg(long, env = "WATCHLIST_REFRESH_TOLERANCE_SECS", default_value_t = DEFAULT_REFRESH_TOLERANCE_SECS)]
    pub refresh_tolerance_secs: u64,

    /// `host:port` probed to decide whether the network is up. Defaults to the quote host.
    #[arg(long, env = "WATCHLIST_PROBE_ADDR")]
    pub probe_addr: Option<String>,

    /// Skip the connectivity probe and always consider the network up.
    #[arg(long, env = "WATCHLIST_ASSUME_ONLINE")]
    pub assume_online: bool,

    /// Non-current rows kept per symbol.
    #[arg(long, env = "WATCHLIST_HISTORY_LIMIT", default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,

    /// Cancel the background refresh registration instead of ensuring it.
    #[arg(long, env = "WATCHLIST_NO_PERIODIC")]
    pub no_periodic: bool,
}

impl ServerConfig {
    /// Path of the quote store file.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("quotes.json")
    }

    /// Path of the periodic registration file.
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("schedule.json")
    }

    /// Probe target: explicit `--probe-addr`, else the quote endpoint's host.
    pub fn probe_target(&self) -> Option<String> {
        self.probe_addr.clone().or_else(|| host_port(&self.quote_url))
    }

    /// Refresh period.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Refresh tolerance window.
    pub fn refresh_tolerance(&self) -> Duration {
        Duration::from_secs(self.refresh_tolerance_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hourly_refresh() {
        let config = ServerConfig::try_parse_from(["watchlist_server"]).expect("parse");
        assert_eq!(config.refresh_interval(), Duration::from_secs(3600));
        assert_eq!(config.refresh_tolerance(), Duration::from_secs(10));
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.probe_target().as_deref(), Some("127.0.0.1:8090"));
        assert!(!config.no_periodic);
    }

    #[test]
    fn explicit_probe_wins() {
        let config = ServerConfig::try_parse_from([
            "watchlist_server",
            "--probe-addr",
            "1.1.1.1:53",
            "--data-dir",
            "/tmp/wl",
        ])
        .expect("parse");
        assert_eq!(config.probe_target().as_deref(), Some("1.1.1.1:53"));
        assert_eq!(config.store_path(), PathBuf::from("/tmp/wl/quotes.json"));
    }
}
