//! Background auto-sync.
//!
//! Runs a smart sync on a fixed interval, and once more after local edits
//! settle: every [`AutoSyncHandle::notify_local_change`] pushes the pending
//! run back by the debounce delay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::sync::{SyncEngine, Trigger};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct AutoSync {
    interval: Duration,
    debounce: Duration,
}

impl Default for AutoSync {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_INTERVAL, DEFAULT_DEBOUNCE)
    }
}

impl AutoSync {
    pub fn new(interval: Duration, debounce: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_secs(1)),
            debounce,
        }
    }

    /// Starts the loop on the current tokio runtime.
    pub fn spawn(self, engine: Arc<SyncEngine>) -> AutoSyncHandle {
        let (changes, receiver) = mpsc::unbounded_channel();
        let runs = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(self.run(engine, receiver, runs.clone()));

        AutoSyncHandle { changes, task, runs }
    }

    async fn run(self, engine: Arc<SyncEngine>, mut changes: mpsc::UnboundedReceiver<()>, runs: Arc<AtomicUsize>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending: Option<Instant> = None;

        log::info!(
            "Auto-sync every {}s, {}s after local changes",
            self.interval.as_secs(),
            self.debounce.as_secs()
        );

        loop {
            let deadline = pending;
            let debounced = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = ticker.tick() => {
                    pending = None;
                    sync_once(&engine, &runs, "interval").await;
                }
                _ = debounced => {
                    pending = None;
                    sync_once(&engine, &runs, "local change").await;
                }
                change = changes.recv() => match change {
                    Some(()) => pending = Some(Instant::now() + self.debounce),
                    None => break,
                },
            }
        }

        log::info!("Auto-sync stopped");
    }
}

async fn sync_once(engine: &SyncEngine, runs: &AtomicUsize, reason: &str) {
    log::debug!("Auto-sync triggered by {}", reason);
    let outcome = engine.smart_sync(Trigger::Auto).await;
    runs.fetch_add(1, Ordering::SeqCst);

    if outcome.success {
        log::info!("Auto-sync {}: {}", outcome.action, outcome.message);
    } else {
        log::warn!("Auto-sync {}: {}", outcome.action, outcome.message);
    }
}

/// Controls a running [`AutoSync`] loop.
pub struct AutoSyncHandle {
    changes: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
    runs: Arc<AtomicUsize>,
}

impl AutoSyncHandle {
    /// Schedules a sync once edits have been quiet for the debounce delay.
    pub fn notify_local_change(&self) {
        if self.changes.send(()).is_err() {
            log::debug!("Auto-sync loop is gone, dropping change notification");
        }
    }

    /// Completed sync attempts.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Stops the loop after any in-progress sync finishes.
    pub async fn shutdown(self) {
        drop(self.changes);
        if let Err(e) = self.task.await {
            log::warn!("Auto-sync task ended abnormally: {}", e);
        }
    }
}
