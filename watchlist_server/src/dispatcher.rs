//! Serialized dispatch of mutation requests.
//!
//! All requests, whatever raised them, go through one worker thread that owns the write
//! side of the store. A cycle walks
//! `Idle -> CheckingNetwork -> {Aborted | Planning -> Fetching -> Applying -> Done}`
//! and always ends in a `DispatchOutcome`; nothing in a cycle can take the worker down.
//!
//! Queueing rules:
//! - requests run one at a time in arrival order and are never dropped;
//! - a `PeriodicRefresh` submitted while another one is still queued joins it, and all
//!   of its submitters receive the same outcome;
//! - a `PeriodicRefresh` submitted while another one is fetching cancels the one in
//!   flight (it writes nothing), and the callers of the cancelled one are answered by
//!   the newer refresh. `Add`/`Delete` are never cancelled.
//!
//! Callers get a completion `Receiver` back from `submit`, so they can wait, poll, or
//! drop it. Every finished cycle is also broadcast to subscribers as a `DispatchEvent`.

use crate::fetcher::QuoteFetcher;
use crate::model::reconciler::{FetchPlan, Reconciler};
use crate::model::store::QuoteStore;
use crate::network::Connectivity;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use strum_macros::Display;
use watchlist_common::{
    ApplySummary, DispatchOutcome, FailureReason, MutationRequest, Result, SkipReason,
    WatchlistError,
};

/// Events buffered per subscriber before it is dropped.
pub const SUBSCRIBER_CAPACITY: usize = 64;

/// Phases of one dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DispatchPhase {
    /// Not started.
    Idle,
    /// Asking the connectivity check.
    CheckingNetwork,
    /// Stopped before planning (no network).
    Aborted,
    /// Computing the fetch plan from the current watchlist.
    Planning,
    /// Waiting on the remote quote API.
    Fetching,
    /// Committing store writes.
    Applying,
    /// Finished.
    Done,
}

/// A finished dispatch cycle, as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    /// The request that ran.
    pub request: MutationRequest,
    /// How it ended.
    pub outcome: DispatchOutcome,
}

/// One dispatch cycle's collaborators.
pub struct Pipeline {
    store: Arc<dyn QuoteStore>,
    fetcher: Arc<dyn QuoteFetcher>,
    network: Arc<dyn Connectivity>,
    reconciler: Reconciler,
}

impl Pipeline {
    /// Bundle the collaborators of a dispatch cycle.
    pub fn new(
        store: Arc<dyn QuoteStore>,
        fetcher: Arc<dyn QuoteFetcher>,
        network: Arc<dyn Connectivity>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            store,
            fetcher,
            network,
            reconciler,
        }
    }

    /// Run one full cycle for `request`.
    ///
    /// `cancel` is checked once the fetch returns; when set, the cycle ends with
    /// `Superseded` and nothing is written.
    pub fn run(&self, request: &MutationRequest, cancel: &AtomicBool) -> DispatchOutcome {
        let mut phase = DispatchPhase::Idle;
        let mut enter = |next: DispatchPhase| {
            debug!("{}: {} -> {}", request, phase, next);
            phase = next;
        };

        enter(DispatchPhase::CheckingNetwork);
        if !self.network.is_connected() {
            enter(DispatchPhase::Aborted);
            return DispatchOutcome::Skipped(SkipReason::NetworkUnavailable);
        }

        enter(DispatchPhase::Planning);
        let snapshot = self.store.snapshot();
        let plan = self.reconciler.plan(request, &snapshot);
        let outcome = match plan {
            FetchPlan::Nothing => DispatchOutcome::Unchanged,
            FetchPlan::AlreadyPresent(symbol) => DispatchOutcome::NoOpAlreadyPresent(symbol),
            FetchPlan::Remove(symbol) => {
                enter(DispatchPhase::Applying);
                match self.store.commit(&self.reconciler.removal(&symbol)) {
                    Ok(removed) => DispatchOutcome::Applied(ApplySummary {
                        removed,
                        ..ApplySummary::default()
                    }),
                    Err(e) => DispatchOutcome::Failed(FailureReason::Store(e.to_string())),
                }
            }
            FetchPlan::Fetch(symbols) => {
                enter(DispatchPhase::Fetching);
                match self.fetcher.fetch(&symbols) {
                    Err(e) => DispatchOutcome::Failed(FailureReason::Fetch(e)),
                    Ok(_) if cancel.load(Ordering::SeqCst) => DispatchOutcome::Superseded,
                    Ok(report) => {
                        enter(DispatchPhase::Applying);
                        let writes = self.reconciler.apply(&report, &symbols, Utc::now());
                        match self.store.commit(&writes) {
                            Ok(removed) => DispatchOutcome::Applied(ApplySummary {
                                refreshed: writes.insert.iter().map(|r| r.symbol.clone()).collect(),
                                invalid: writes.retire.clone(),
                                removed,
                            }),
                            Err(e) => DispatchOutcome::Failed(FailureReason::Store(e.to_string())),
                        }
                    }
                }
            }
        };
        enter(DispatchPhase::Done);
        outcome
    }
}

struct Job {
    seq: u64,
    request: MutationRequest,
    replies: Vec<Sender<DispatchOutcome>>,
}

enum WorkerMessage {
    Job(u64, MutationRequest, Sender<DispatchOutcome>),
    Subscribe(Sender<DispatchEvent>),
    Shutdown,
}

/// Sequence number and cancellation flag of the refresh currently running, if any.
type InFlightRefresh = Arc<Mutex<Option<(u64, Arc<AtomicBool>)>>>;

/// Cloneable submission side of the dispatcher.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: Sender<WorkerMessage>,
    next_seq: Arc<AtomicU64>,
    in_flight_refresh: InFlightRefresh,
}

impl DispatchHandle {
    /// Queue `request`; the returned channel yields its outcome once.
    pub fn submit(&self, request: MutationRequest) -> Result<Receiver<DispatchOutcome>> {
        let (reply_tx, reply_rx) = bounded(1);
        let is_refresh = request == MutationRequest::PeriodicRefresh;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.tx
            .send(WorkerMessage::Job(seq, request, reply_tx))
            .map_err(|e| WatchlistError::ChannelSend(format!("dispatcher stopped: {e}")))?;
        // Only after the newer refresh is queued, so the worker can hand callers over.
        if is_refresh {
            if let Some((running, flag)) = self.in_flight_refresh.lock().as_ref() {
                if *running < seq {
                    flag.store(true, Ordering::SeqCst);
                }
            }
        }
        Ok(reply_rx)
    }

    /// Queue `request` and wait for its outcome.
    pub fn dispatch(&self, request: MutationRequest) -> Result<DispatchOutcome> {
        self.submit(request)?
            .recv()
            .map_err(|e| WatchlistError::ChannelRecv(format!("dispatcher dropped reply: {e}")))
    }

    /// Receive an event for every finished cycle from now on.
    ///
    /// At most [`SUBSCRIBER_CAPACITY`] events are buffered. A subscriber that falls
    /// further behind is dropped: its receiver yields what was buffered, then reports
    /// disconnection.
    pub fn subscribe(&self) -> Result<Receiver<DispatchEvent>> {
        let (event_tx, event_rx) = bounded(SUBSCRIBER_CAPACITY);
        self.tx
            .send(WorkerMessage::Subscribe(event_tx))
            .map_err(|e| WatchlistError::ChannelSend(format!("dispatcher stopped: {e}")))?;
        Ok(event_rx)
    }
}

/// Owner of the dispatcher worker thread.
pub struct Dispatcher {
    handle: DispatchHandle,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the worker thread running `pipeline`.
    pub fn start(pipeline: Pipeline) -> Result<Self> {
        let (tx, rx) = unbounded::<WorkerMessage>();
        let in_flight_refresh: InFlightRefresh = Arc::new(Mutex::new(None));
        let worker_in_flight = Arc::clone(&in_flight_refresh);

        let worker = thread::Builder::new()
            .name("watchlist-dispatcher".to_string())
            .spawn(move || Worker::new(pipeline, rx, worker_in_flight).run())?;
        info!("Dispatcher started");

        Ok(Self {
            handle: DispatchHandle {
                tx,
                next_seq: Arc::new(AtomicU64::new(0)),
                in_flight_refresh,
            },
            worker: Some(worker),
        })
    }

    /// Submission handle; cheap to clone and share across threads.
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// See [`DispatchHandle::submit`].
    pub fn submit(&self, request: MutationRequest) -> Result<Receiver<DispatchOutcome>> {
        self.handle.submit(request)
    }

    /// See [`DispatchHandle::dispatch`].
    pub fn dispatch(&self, request: MutationRequest) -> Result<DispatchOutcome> {
        self.handle.dispatch(request)
    }

    /// See [`DispatchHandle::subscribe`].
    pub fn subscribe(&self) -> Result<Receiver<DispatchEvent>> {
        self.handle.subscribe()
    }

    /// Finish every queued request, then stop the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.tx.send(WorkerMessage::Shutdown);
            if worker.join().is_err() {
                error!("Dispatcher worker panicked");
            }
            info!("Dispatcher stopped");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    pipeline: Pipeline,
    rx: Receiver<WorkerMessage>,
    in_flight_refresh: InFlightRefresh,
    queue: VecDeque<Job>,
    subscribers: Vec<Sender<DispatchEvent>>,
    stopping: bool,
}

impl Worker {
    fn new(pipeline: Pipeline, rx: Receiver<WorkerMessage>, in_flight_refresh: InFlightRefresh) -> Self {
        Self {
            pipeline,
            rx,
            in_flight_refresh,
            queue: VecDeque::new(),
            subscribers: Vec::new(),
            stopping: false,
        }
    }

    fn run(mut self) {
        loop {
            if self.queue.is_empty() {
                if self.stopping {
                    break;
                }
                match self.rx.recv() {
                    Ok(message) => self.accept(message),
                    Err(_) => break,
                }
            }
            self.drain();

            if let Some(job) = self.queue.pop_front() {
                self.execute(job);
            }
        }
        debug!("Dispatcher worker exiting");
    }

    fn drain(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.accept(message);
        }
    }

    fn accept(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Job(seq, request, reply) => self.enqueue(seq, request, vec![reply]),
            WorkerMessage::Subscribe(subscriber) => self.subscribers.push(subscriber),
            WorkerMessage::Shutdown => self.stopping = true,
        }
    }

    fn enqueue(&mut self, seq: u64, request: MutationRequest, replies: Vec<Sender<DispatchOutcome>>) {
        if request == MutationRequest::PeriodicRefresh {
            if let Some(pending) = self
                .queue
                .iter_mut()
                .find(|job| job.request == MutationRequest::PeriodicRefresh)
            {
                debug!("Coalescing PeriodicRefresh into the queued one");
                pending.seq = pending.seq.max(seq);
                pending.replies.extend(replies);
                return;
            }
        }
        self.queue.push_back(Job {
            seq,
            request,
            replies,
        });
    }

    fn execute(&mut self, job: Job) {
        let cancel = Arc::new(AtomicBool::new(false));
        let is_refresh = job.request == MutationRequest::PeriodicRefresh;
        if is_refresh {
            *self.in_flight_refresh.lock() = Some((job.seq, Arc::clone(&cancel)));
        }

        let outcome = self.pipeline.run(&job.request, &cancel);

        if is_refresh {
            *self.in_flight_refresh.lock() = None;
        }
        self.report(&job.request, &outcome);

        if outcome == DispatchOutcome::Superseded {
            // The superseding refresh is already queued; its outcome answers these callers.
            self.drain();
            self.enqueue(job.seq, MutationRequest::PeriodicRefresh, job.replies);
        } else {
            for reply in job.replies {
                let _ = reply.send(outcome.clone());
            }
        }
    }

    fn report(&mut self, request: &MutationRequest, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Applied(summary) => info!(
                "{}: applied ({} refreshed, {} invalid, {} removed)",
                request,
                summary.refreshed.len(),
                summary.invalid.len(),
                summary.removed
            ),
            DispatchOutcome::NoOpAlreadyPresent(symbol) => {
                info!("{}: {} is already watched", request, symbol)
            }
            DispatchOutcome::Unchanged => info!("{}: nothing to do", request),
            DispatchOutcome::Skipped(reason) => warn!("{}: skipped ({})", request, reason),
            DispatchOutcome::Failed(reason) => warn!("{}: failed ({})", request, reason),
            DispatchOutcome::Superseded => info!("{}: superseded by a newer refresh", request),
        }

        let event = DispatchEvent {
            request: request.clone(),
            outcome: outcome.clone(),
        };
        self.subscribers.retain(|subscriber| match subscriber.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Dropping a subscriber that stopped reading events");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
