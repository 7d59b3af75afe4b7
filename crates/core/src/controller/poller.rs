//! Periodic background refresh.
//!
//! One task per controller ticks at the configured poll interval and asks the controller
//! to refresh. Missed ticks are skipped rather than bunched up, and a tick that lands while
//! the previous poll is still running is skipped by the controller itself.

use super::{QueueController, RefreshCause};
use crate::QueueError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling. The controller itself keeps running.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "queue poller task ended abnormally");
        }
    }
}

impl QueueController {
    /// Start polling in the background. The first poll runs immediately.
    ///
    /// The loop ends on [`PollerHandle::stop`] or when the controller shuts down.
    pub fn spawn_poller(&self) -> PollerHandle {
        let cancel = self.shutdown_token().child_token();
        let task = tokio::spawn(run_poll_loop(self.clone(), cancel.clone()));
        PollerHandle { cancel, task }
    }
}

async fn run_poll_loop(controller: QueueController, cancel: CancellationToken) {
    let period = controller.config().poll_interval();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(interval_secs = period.as_secs_f64(), "queue poller started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // Fetch failures are logged by the controller; the next tick retries.
                let outcome = controller.refresh_with(RefreshCause::Poll).await;
                if matches!(outcome, Err(QueueError::ShutDown)) {
                    break;
                }
            }
        }
    }

    tracing::info!("queue poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueueConfig, SessionContext};
    use crate::store::{MemoryQueueStore, StoreError, StoreOperation};
    use queue_types::{EntryId, Priority, QueueEntry};
    use std::sync::Arc;
    use std::time::Duration;

    fn controller(store: &MemoryQueueStore) -> QueueController {
        let cfg = QueueConfig::new(
            "http://clinic.test",
            Duration::from_secs(10),
            Duration::from_secs(8),
        )
        .expect("config");
        let store = Arc::new(store.clone());
        QueueController::new(Arc::new(cfg), SessionContext::default(), store.clone(), store)
    }

    /// Let spawned tasks run until they block on the (paused) clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_refreshes_on_each_interval() {
        let store = MemoryQueueStore::with_entries([
            QueueEntry::new(EntryId::new(1)).with_priority(Priority::Normal),
        ]);
        let ctl = controller(&store);
        let poller = ctl.spawn_poller();

        settle().await;
        assert_eq!(store.calls(StoreOperation::Fetch), 1);
        assert_eq!(ctl.snapshot().await.len(), 1);

        store.insert(QueueEntry::new(EntryId::new(2)).with_priority(Priority::Critical));
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(store.calls(StoreOperation::Fetch), 2);
        assert_eq!(ctl.current().await.map(|r| r.entry.id), Some(EntryId::new(1)));
        assert_eq!(ctl.snapshot().await.len(), 2);

        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_survives_fetch_failures() {
        let store = MemoryQueueStore::with_entries([QueueEntry::new(EntryId::new(1))]);
        store.fail_next(StoreOperation::Fetch, StoreError::Transport("down".into()));
        let ctl = controller(&store);
        let poller = ctl.spawn_poller();

        settle().await;
        assert!(ctl.snapshot().await.is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(ctl.snapshot().await.len(), 1);
        assert!(!poller.is_finished());

        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_controller_shutdown_stops_poller() {
        let store = MemoryQueueStore::new();
        let ctl = controller(&store);
        let poller = ctl.spawn_poller();
        settle().await;

        ctl.shutdown();
        settle().await;
        assert!(poller.is_finished());
        assert_eq!(store.calls(StoreOperation::Fetch), 1);
    }
}
