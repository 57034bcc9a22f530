//! Periodic refresh registration and the timer that honors it.
//!
//! Registrations are keyed by tag and persisted to a JSON file, so registering the same
//! tag again (in this process or after a restart) replaces the previous entry instead
//! of adding a second trigger. Registration never touches the store or the network: it
//! only tells the timer thread when to raise the next `PeriodicRefresh`.
//!
//! Each firing is scheduled `interval` after the previous one plus a random delay within
//! the tolerance window. A task that requires the network is silently skipped while
//! disconnected; the dispatcher repeats the check anyway.

use crate::dispatcher::DispatchHandle;
use crate::model::persist::{read_json, write_json_atomic};
use crate::network::Connectivity;
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use log::{debug, error, info};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use watchlist_common::{MutationRequest, Result, WatchlistError};

/// Tag of the watchlist refresh registration.
pub const PERIODIC_TAG: &str = "periodic";

/// Wait used by the timer when nothing is registered.
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// Longest time between two firings; keeps `Instant` arithmetic in range.
const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 3600);

/// One recurring trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicTask {
    /// Registration key.
    pub tag: String,
    /// Nominal period.
    pub interval_ms: u64,
    /// Extra delay window; each firing lands somewhere inside it.
    pub tolerance_ms: u64,
    /// Skip firings while the network is down.
    pub requires_network: bool,
}

impl PeriodicTask {
    /// Watchlist refresh task under [`PERIODIC_TAG`].
    pub fn refresh(interval: Duration, tolerance: Duration) -> Self {
        Self {
            tag: PERIODIC_TAG.to_string(),
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            tolerance_ms: u64::try_from(tolerance.as_millis()).unwrap_or(u64::MAX),
            requires_network: true,
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter = if self.tolerance_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.tolerance_ms)
        };
        Duration::from_millis(self.interval_ms.max(1).saturating_add(jitter)).min(MAX_DELAY)
    }
}

enum TimerControl {
    Upsert(PeriodicTask),
    Cancel(String),
    Shutdown,
}

/// Tag-keyed periodic registrations backed by a timer thread.
pub struct JobScheduler {
    registry_path: Option<PathBuf>,
    tasks: Mutex<BTreeMap<String, PeriodicTask>>,
    control_tx: Sender<TimerControl>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Load persisted registrations from `registry_path` (if any) and start the timer.
    ///
    /// Loaded registrations are armed right away: the first firing comes one interval
    /// after start.
    pub fn start(
        registry_path: Option<PathBuf>,
        dispatcher: DispatchHandle,
        network: Arc<dyn Connectivity>,
    ) -> Result<Self> {
        let tasks: BTreeMap<String, PeriodicTask> = match &registry_path {
            Some(path) => read_json::<Vec<PeriodicTask>>(path)?
                .unwrap_or_default()
                .into_iter()
                .map(|task| (task.tag.clone(), task))
                .collect(),
            None => BTreeMap::new(),
        };
        if !tasks.is_empty() {
            info!("Restored {} periodic registrations", tasks.len());
        }

        let (control_tx, control_rx) = unbounded();
        let initial: Vec<PeriodicTask> = tasks.values().cloned().collect();
        let timer = thread::Builder::new()
            .name("watchlist-timer".to_string())
            .spawn(move || run_timer(initial, control_rx, dispatcher, network))?;

        Ok(Self {
            registry_path,
            tasks: Mutex::new(tasks),
            control_tx,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Register the watchlist refresh under [`PERIODIC_TAG`], replacing any previous one.
    pub fn ensure_periodic(&self, interval: Duration, tolerance: Duration) -> Result<()> {
        self.schedule(PeriodicTask::refresh(interval, tolerance))
    }

    /// Remove the watchlist refresh. Returns whether one was registered.
    pub fn cancel_periodic(&self) -> Result<bool> {
        self.cancel(PERIODIC_TAG)
    }

    /// Register `task`, replacing the registration with the same tag.
    ///
    /// Re-registering an identical task keeps its current timing.
    pub fn schedule(&self, task: PeriodicTask) -> Result<()> {
        let mut tasks = self.tasks.lock();
        if tasks.get(&task.tag) == Some(&task) {
            debug!("Periodic task {:?} already registered", task.tag);
            return Ok(());
        }
        let mut next = tasks.clone();
        next.insert(task.tag.clone(), task.clone());
        self.persist(&next)?;
        *tasks = next;
        info!(
            "Registered periodic task {:?} every {} ms (tolerance {} ms)",
            task.tag, task.interval_ms, task.tolerance_ms
        );
        self.send(TimerControl::Upsert(task))
    }

    /// Remove the registration with `tag`. Returns whether one existed.
    pub fn cancel(&self, tag: &str) -> Result<bool> {
        let mut tasks = self.tasks.lock();
        if !tasks.contains_key(tag) {
            return Ok(false);
        }
        let mut next = tasks.clone();
        next.remove(tag);
        self.persist(&next)?;
        *tasks = next;
        info!("Cancelled periodic task {:?}", tag);
        self.send(TimerControl::Cancel(tag.to_string()))?;
        Ok(true)
    }

    /// Current registrations, ordered by tag.
    pub fn registrations(&self) -> Vec<PeriodicTask> {
        self.tasks.lock().values().cloned().collect()
    }

    /// Stop the timer thread. Registrations stay persisted.
    pub fn shutdown(&self) {
        if let Some(timer) = self.timer.lock().take() {
            let _ = self.control_tx.send(TimerControl::Shutdown);
            if timer.join().is_err() {
                error!("Timer thread panicked");
            }
        }
    }

    fn persist(&self, tasks: &BTreeMap<String, PeriodicTask>) -> Result<()> {
        match &self.registry_path {
            Some(path) => {
                let list: Vec<&PeriodicTask> = tasks.values().collect();
                write_json_atomic(path, &list)
            }
            None => Ok(()),
        }
    }

    fn send(&self, control: TimerControl) -> Result<()> {
        self.control_tx
            .send(control)
            .map_err(|_| WatchlistError::ChannelSend("timer thread stopped".to_string()))
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Armed {
    task: PeriodicTask,
    due: Instant,
}

fn arm(task: PeriodicTask) -> Armed {
    let due = Instant::now() + task.next_delay();
    Armed { task, due }
}

fn run_timer(
    initial: Vec<PeriodicTask>,
    control_rx: Receiver<TimerControl>,
    dispatcher: DispatchHandle,
    network: Arc<dyn Connectivity>,
) {
    let mut armed: BTreeMap<String, Armed> = initial
        .into_iter()
        .map(|task| (task.tag.clone(), arm(task)))
        .collect();

    loop {
        let now = Instant::now();
        let wait = armed
            .values()
            .map(|a| a.due.saturating_duration_since(now))
            .min()
            .unwrap_or(IDLE_WAIT);

        select! {
            recv(control_rx) -> message => match message {
                Ok(TimerControl::Upsert(task)) => {
                    armed.insert(task.tag.clone(), arm(task));
                }
                Ok(TimerControl::Cancel(tag)) => {
                    armed.remove(&tag);
                }
                Ok(TimerControl::Shutdown) | Err(_) => break,
            },
            default(wait) => {
                let now = Instant::now();
                for entry in armed.values_mut() {
                    if entry.due > now {
                        continue;
                    }
                    fire(&entry.task, &dispatcher, network.as_ref());
                    *entry = arm(entry.task.clone());
                }
            }
        }
    }
    debug!("Timer thread exiting");
}

fn fire(task: &PeriodicTask, dispatcher: &DispatchHandle, network: &dyn Connectivity) {
    if task.requires_network && !network.is_connected() {
        debug!("Skipping {:?}: network unavailable", task.tag);
        return;
    }
    debug!("Raising PeriodicRefresh for {:?}", task.tag);
    // Outcome reaches the log and subscribers through the dispatcher.
    if let Err(e) = dispatcher.submit(MutationRequest::PeriodicRefresh) {
        error!("Failed to raise PeriodicRefresh: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_lands_inside_the_tolerance_window() {
        let task = PeriodicTask::refresh(Duration::from_millis(50), Duration::from_millis(10));
        for _ in 0..20 {
            let delay = task.next_delay();
            assert!(delay >= Duration::from_millis(50) && delay <= Duration::from_millis(60));
        }
    }

    #[test]
    fn huge_interval_saturates_instead_of_wrapping() {
        let task = PeriodicTask::refresh(Duration::MAX, Duration::MAX);
        assert_eq!(task.interval_ms, u64::MAX);
        assert_eq!(task.tolerance_ms, u64::MAX);
        assert_eq!(task.next_delay(), MAX_DELAY);
        let armed = arm(task);
        assert!(armed.due > Instant::now());
    }
}
