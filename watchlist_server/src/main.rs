//! Watchlist synchronization server.
//!
//! This binary keeps a local stock watchlist fresh. It wires together:
//!
//! - `JsonFileStore` — quote rows persisted under `--data-dir`.
//! - `Dispatcher` — single worker that runs every mutation request through
//!   network check, planning, fetch and commit.
//! - `JobScheduler` — persisted hourly registration that raises `PeriodicRefresh`.
//! - `CommandReceiver` — TCP command channel used by `watchlist_client`.
//!
//! Startup raises `Init` when the store is empty so a first launch shows the default
//! symbols. Ctrl+C stops the receiver, then the timer, then the dispatcher.
#![warn(missing_docs)]
use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info, warn};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use watchlist_common::{DispatchOutcome, MutationRequest, Result, WatchlistError};
use watchlist_server::config::ServerConfig;
use watchlist_server::dispatcher::Pipeline;
use watchlist_server::receiver::CommandReceiver;
use watchlist_server::{
    Connectivity, Dispatcher, HttpQuoteFetcher, JobScheduler, JsonFileStore, ManualConnectivity,
    QuoteStore, Reconciler, TcpProbe,
};

/// Per-address wait of the connectivity probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    init_logger();
    let config = ServerConfig::parse();
    if let Err(e) = run(config) {
        error!("Server failed: {}", e);
        return Err(e);
    }
    Ok(())
}

fn run(config: ServerConfig) -> Result<()> {
    let store: Arc<dyn QuoteStore> =
        Arc::new(JsonFileStore::open(config.store_path(), config.history_limit)?);
    info!(
        "Store opened at {} with {} watched symbols",
        config.store_path().display(),
        store.snapshot().len()
    );

    let network = build_connectivity(&config)?;
    let fetcher = Arc::new(HttpQuoteFetcher::new(
        config.quote_url.clone(),
        config.fetch_timeout_ms,
    )?);
    let dispatcher = Dispatcher::start(Pipeline::new(
        Arc::clone(&store),
        fetcher,
        Arc::clone(&network),
        Reconciler::default(),
    ))?;

    let scheduler = JobScheduler::start(
        Some(config.registry_path()),
        dispatcher.handle(),
        Arc::clone(&network),
    )?;
    if store.snapshot().is_empty() {
        seed_watchlist(&dispatcher)?;
    }

    if config.no_periodic {
        scheduler.cancel_periodic()?;
    } else {
        scheduler.ensure_periodic(config.refresh_interval(), config.refresh_tolerance())?;
    }

    let receiver = CommandReceiver::bind(&config.bind)?;
    let bound = receiver.local_addr()?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let receiver_thread = {
        let handle = dispatcher.handle();
        let store = Arc::clone(&store);
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || receiver.serve(handle, store, shutdown))
    };

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| WatchlistError::Format(format!("cannot install Ctrl+C handler: {e}")))?;

    info!("Server is running. Press Ctrl+C to exit.");
    let _ = stop_rx.recv();
    info!("Ctrl+C received. Shutting down server...");

    shutdown.store(true, Ordering::SeqCst);
    // Wake the blocking accept so the receiver sees the flag.
    let _ = TcpStream::connect(bound);
    if receiver_thread.join().is_err() {
        error!("Receiver thread panicked");
    }
    scheduler.shutdown();
    dispatcher.shutdown();
    Ok(())
}

fn build_connectivity(config: &ServerConfig) -> Result<Arc<dyn Connectivity>> {
    if config.assume_online {
        warn!("Connectivity probe disabled; network always considered up");
        return Ok(Arc::new(ManualConnectivity::new(true)));
    }
    let target = config.probe_target().ok_or_else(|| {
        WatchlistError::Format(format!(
            "cannot derive a probe address from {:?}; pass --probe-addr",
            config.quote_url
        ))
    })?;
    info!("Connectivity probe target: {}", target);
    Ok(Arc::new(TcpProbe::new(target, PROBE_TIMEOUT)))
}

/// Raise `Init` for an empty store and log what happened.
fn seed_watchlist(dispatcher: &Dispatcher) -> Result<()> {
    match dispatcher.dispatch(MutationRequest::Init)? {
        DispatchOutcome::Applied(summary) => {
            info!("Seeded watchlist with {} symbols", summary.refreshed.len())
        }
        DispatchOutcome::Skipped(reason) => {
            warn!("Watchlist not seeded ({}); will seed on next start", reason)
        }
        other => warn!("Watchlist seed ended with {:?}", other),
    }
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
