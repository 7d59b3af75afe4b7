//! Queue controller.
//!
//! Owns the reconciled view for one staff session and is the only thing that mutates it.
//! Three kinds of activity reach it concurrently:
//! - periodic polls from the [`poller`],
//! - manual refreshes,
//! - staff commands (advance, remove, emergency insert).
//!
//! Rules applied here:
//! - Commands are pessimistic. Local state changes only after the store confirms the
//!   effect; any failure or timeout leaves the view exactly as it was.
//! - Commands run one at a time. A second command waits for the first to settle.
//! - A poll that arrives while another poll is still in flight is skipped.
//! - Every fetch takes a ticket when it starts. A result whose ticket is older than the one
//!   last applied is discarded, so a slow response never overwrites a fresher one.
//! - Entries removed by a confirmed command are retired: they are filtered out of any
//!   snapshot fetched before the removal was confirmed.
//! - After [`QueueController::shutdown`], in-flight results are discarded and new work is
//!   refused with [`QueueError::ShutDown`].

pub mod poller;

pub use poller::PollerHandle;

use crate::config::{QueueConfig, SessionContext};
use crate::error::QueueCommand;
use crate::reconcile::reconcile;
use crate::store::{HttpQueueStore, PriorityClassifier, QueueStore, StoreError, StoreResult};
use crate::view::{QueueRow, QueueSnapshot};
use crate::{QueueError, QueueResult};
use chrono::Utc;
use queue_types::{EntryId, Patient, PatientIdentifier, Priority, QueueEntry};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// What triggered a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshCause {
    Poll,
    Manual,
    Command,
}

impl RefreshCause {
    fn as_str(self) -> &'static str {
        match self {
            RefreshCause::Poll => "poll",
            RefreshCause::Manual => "manual",
            RefreshCause::Command => "command",
        }
    }
}

/// How a successful refresh call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched snapshot replaced the view.
    Applied {
        entries: usize,
        serving: Option<EntryId>,
    },
    /// A poll was already in flight; nothing was fetched.
    Skipped,
    /// A newer snapshot was applied first; this one was discarded.
    Superseded,
}

/// Result of [`QueueController::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// The queue was empty. No store call was made.
    NothingToAdvance,
    Advanced {
        /// The entry that was marked complete, as it was numbered before completion.
        completed: QueueRow,
        now_serving: Option<QueueRow>,
        /// False if the follow-up refresh failed; the view is then marked stale.
        refreshed: bool,
    },
}

/// Result of [`QueueController::remove`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveOutcome {
    pub removed: EntryId,
    pub was_serving: bool,
    pub now_serving: Option<QueueRow>,
    pub refreshed: bool,
}

/// Result of [`QueueController::emergency_insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyOutcome {
    pub patient: Patient,
    /// Band the classifier assigned.
    pub priority: Priority,
    /// The patient's row after the follow-up refresh, if it was seen.
    pub entry: Option<QueueRow>,
    pub refreshed: bool,
}

#[derive(Debug, Default)]
struct ControllerState {
    snapshot: QueueSnapshot,
    /// Ticket of the last snapshot applied to the view.
    applied_ticket: u64,
    /// Confirmed removals, keyed to the last ticket issued before confirmation.
    retired: HashMap<EntryId, u64>,
}

impl ControllerState {
    fn apply(&mut self, ticket: u64, batch: Vec<QueueEntry>) {
        // A fetch that started after the removal and no longer lists the id settles it.
        self.retired.retain(|id, issued_before| {
            ticket <= *issued_before || batch.iter().any(|e| e.id == *id)
        });
        let batch: Vec<QueueEntry> = batch
            .into_iter()
            .filter(|e| !self.retired.contains_key(&e.id))
            .collect();

        self.snapshot.view = reconcile(self.snapshot.view.serving_id(), batch);
        self.snapshot.refreshed_at = Some(Utc::now());
        self.snapshot.stale = false;
        self.applied_ticket = ticket;
    }
}

struct ControllerInner {
    cfg: Arc<QueueConfig>,
    session: SessionContext,
    store: Arc<dyn QueueStore>,
    classifier: Arc<dyn PriorityClassifier>,
    state: Mutex<ControllerState>,
    commands: Mutex<()>,
    poll_in_flight: AtomicBool,
    tickets: AtomicU64,
    shutdown: CancellationToken,
}

/// Handle to a session's queue. Cloning shares the same controller.
#[derive(Clone)]
pub struct QueueController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for QueueController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueController")
            .field("api_base_url", &self.inner.cfg.api_base_url())
            .field("session", &self.inner.session)
            .field("shut_down", &self.inner.shutdown.is_cancelled())
            .finish()
    }
}

/// Clears the in-flight flag when a poll finishes, however it finishes.
struct PollGuard<'a>(&'a AtomicBool);

impl<'a> PollGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl QueueController {
    pub fn new(
        cfg: Arc<QueueConfig>,
        session: SessionContext,
        store: Arc<dyn QueueStore>,
        classifier: Arc<dyn PriorityClassifier>,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                cfg,
                session,
                store,
                classifier,
                state: Mutex::new(ControllerState::default()),
                commands: Mutex::new(()),
                poll_in_flight: AtomicBool::new(false),
                tickets: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Controller talking to the clinic backend at `cfg.api_base_url()`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidInput`] if the HTTP client cannot be built.
    pub fn with_http_store(cfg: Arc<QueueConfig>, session: SessionContext) -> QueueResult<Self> {
        let store = HttpQueueStore::new(&cfg, session.clone())
            .map_err(|e| QueueError::InvalidInput(e.to_string()))?;
        let store = Arc::new(store);
        Ok(Self::new(cfg, session, store.clone(), store))
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.cfg
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    // ====================================================================================
    // Queries
    // ====================================================================================

    /// Copy of the current view with freshness information.
    pub async fn snapshot(&self) -> QueueSnapshot {
        self.inner.state.lock().await.snapshot.clone()
    }

    /// The entry being served, numbered by its current position.
    pub async fn current(&self) -> Option<QueueRow> {
        self.inner.state.lock().await.snapshot.current()
    }

    /// Rows matching `query`. See [`crate::filter::filter_rows`].
    pub async fn filter(&self, query: &str) -> Vec<QueueRow> {
        self.inner.state.lock().await.snapshot.filter(query)
    }

    // ====================================================================================
    // Refresh
    // ====================================================================================

    /// Fetch the queue and reconcile the view against it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Fetch`] if the store call fails or times out. The view is
    /// kept and marked stale. Returns [`QueueError::ShutDown`] after shutdown.
    pub async fn refresh(&self) -> QueueResult<RefreshOutcome> {
        self.refresh_with(RefreshCause::Manual).await
    }

    pub(crate) async fn refresh_with(&self, cause: RefreshCause) -> QueueResult<RefreshOutcome> {
        self.ensure_running()?;

        let _poll = match cause {
            RefreshCause::Poll => match PollGuard::acquire(&self.inner.poll_in_flight) {
                Some(guard) => Some(guard),
                None => {
                    tracing::debug!("poll skipped: previous poll still in flight");
                    return Ok(RefreshOutcome::Skipped);
                }
            },
            RefreshCause::Manual | RefreshCause::Command => None,
        };

        let ticket = self.inner.tickets.fetch_add(1, Ordering::AcqRel) + 1;
        let fetched = self.guarded(self.inner.store.fetch_queue()).await?;

        let mut state = self.inner.state.lock().await;
        self.ensure_running()?;

        match fetched {
            Ok(_) if ticket < state.applied_ticket => {
                tracing::debug!(
                    cause = cause.as_str(),
                    ticket,
                    applied = state.applied_ticket,
                    "discarding superseded queue snapshot"
                );
                Ok(RefreshOutcome::Superseded)
            }
            Ok(batch) => {
                state.apply(ticket, batch);
                let view = &state.snapshot.view;
                tracing::debug!(
                    cause = cause.as_str(),
                    entries = view.len(),
                    serving = ?view.serving_id(),
                    "queue reconciled"
                );
                Ok(RefreshOutcome::Applied {
                    entries: view.len(),
                    serving: view.serving_id(),
                })
            }
            Err(source) => {
                if ticket > state.applied_ticket {
                    state.snapshot.stale = true;
                }
                tracing::warn!(
                    cause = cause.as_str(),
                    error = %source,
                    "queue refresh failed; keeping last known order"
                );
                Err(QueueError::Fetch(source))
            }
        }
    }

    // ====================================================================================
    // Commands
    // ====================================================================================

    /// Mark the serving entry complete and move to the next one in priority order.
    ///
    /// On an empty queue this reports [`AdvanceOutcome::NothingToAdvance`] without calling
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::CommandFailed`] if the store does not confirm completion.
    #[tracing::instrument(skip(self), fields(staff_id = self.staff_label()))]
    pub async fn advance(&self) -> QueueResult<AdvanceOutcome> {
        self.ensure_running()?;
        let _command = self.inner.commands.lock().await;

        let Some(completed) = self.current().await else {
            tracing::info!("advance requested on an empty queue");
            return Ok(AdvanceOutcome::NothingToAdvance);
        };
        let id = completed.entry.id;

        self.guarded(self.inner.store.mark_complete(id))
            .await?
            .map_err(|source| command_failed(QueueCommand::Advance, source))?;
        tracing::info!(entry_id = %id, "entry marked complete");

        self.retire(id).await;
        let refreshed = self.follow_up_refresh().await;
        Ok(AdvanceOutcome::Advanced {
            completed,
            now_serving: self.current().await,
            refreshed,
        })
    }

    /// Remove `id` from the queue without serving it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::CommandFailed`] if the store does not confirm removal.
    #[tracing::instrument(skip(self), fields(staff_id = self.staff_label()))]
    pub async fn remove(&self, id: EntryId) -> QueueResult<RemoveOutcome> {
        self.ensure_running()?;
        let _command = self.inner.commands.lock().await;

        let was_serving = self.inner.state.lock().await.snapshot.view.serving_id() == Some(id);

        self.guarded(self.inner.store.remove(id))
            .await?
            .map_err(|source| command_failed(QueueCommand::Remove, source))?;
        tracing::info!(entry_id = %id, was_serving, "entry removed");

        self.retire(id).await;
        let refreshed = self.follow_up_refresh().await;
        Ok(RemoveOutcome {
            removed: id,
            was_serving,
            now_serving: self.current().await,
            refreshed,
        })
    }

    /// Hand a registered patient to the classifier as an emergency.
    ///
    /// The patient is resolved first; the classifier then escalates or enrolls them and the
    /// view is refreshed to show the result.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidIdentifier`] if `patient_identifier` is malformed.
    /// - [`QueueError::PatientNotFound`] if the registry has no such patient.
    /// - [`QueueError::CommandFailed`] if either call fails or times out.
    #[tracing::instrument(skip(self), fields(staff_id = self.staff_label()))]
    pub async fn emergency_insert(&self, patient_identifier: &str) -> QueueResult<EmergencyOutcome> {
        let identifier = PatientIdentifier::new(patient_identifier)?;
        self.ensure_running()?;
        let _command = self.inner.commands.lock().await;

        let patient = match self
            .guarded(self.inner.store.resolve_patient(&identifier))
            .await?
        {
            Ok(patient) => patient,
            Err(StoreError::NotFound(_)) => {
                tracing::info!(patient = %identifier, "emergency insert for unknown patient");
                return Err(QueueError::PatientNotFound(identifier.to_string()));
            }
            Err(source) => return Err(command_failed(QueueCommand::EmergencyInsert, source)),
        };

        let priority = self
            .guarded(self.inner.classifier.reprioritize(&identifier))
            .await?
            .map_err(|source| command_failed(QueueCommand::EmergencyInsert, source))?;
        tracing::info!(patient = %identifier, %priority, "patient escalated");

        let refreshed = self.follow_up_refresh().await;
        let entry = self
            .snapshot()
            .await
            .rows()
            .into_iter()
            .find(|row| {
                row.entry
                    .patient
                    .as_ref()
                    .is_some_and(|p| p.identifier == patient.identifier)
            });

        Ok(EmergencyOutcome {
            patient,
            priority,
            entry,
            refreshed,
        })
    }

    // ====================================================================================
    // Lifecycle
    // ====================================================================================

    /// Stop the controller. Pending store calls are abandoned and their results dropped.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            tracing::info!("queue controller shutting down");
            self.inner.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    // ====================================================================================
    // Internals
    // ====================================================================================

    fn ensure_running(&self) -> QueueResult<()> {
        if self.inner.shutdown.is_cancelled() {
            Err(QueueError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn staff_label(&self) -> &str {
        self.inner.session.staff_id().unwrap_or("-")
    }

    /// Run a store call under the request timeout, abandoning it on shutdown.
    ///
    /// The outer error is shutdown; the inner result is the store's answer, with an elapsed
    /// timeout reported as [`StoreError::Timeout`].
    async fn guarded<T>(
        &self,
        call: impl Future<Output = StoreResult<T>>,
    ) -> QueueResult<StoreResult<T>> {
        let timeout = self.inner.cfg.request_timeout();
        tokio::select! {
            _ = self.inner.shutdown.cancelled() => Err(QueueError::ShutDown),
            result = tokio::time::timeout(timeout, call) => {
                Ok(result.unwrap_or(Err(StoreError::Timeout(timeout))))
            }
        }
    }

    /// Drop a confirmed-removed entry from the view and from later stale snapshots.
    async fn retire(&self, id: EntryId) {
        let mut state = self.inner.state.lock().await;
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let issued_before = self.inner.tickets.load(Ordering::Acquire);
        state.retired.insert(id, issued_before);
        state.snapshot.view = state.snapshot.view.without(id);
    }

    /// The single reconciliation that follows a confirmed command.
    async fn follow_up_refresh(&self) -> bool {
        match self.refresh_with(RefreshCause::Command).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "follow-up refresh failed; next poll will retry");
                false
            }
        }
    }
}

fn command_failed(command: QueueCommand, source: StoreError) -> QueueError {
    tracing::warn!(%command, error = %source, "command not confirmed; queue unchanged");
    QueueError::CommandFailed { command, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryQueueStore, StoreOperation};
    use chrono::TimeZone;
    use std::time::Duration;

    fn entry(id: u64, priority: Priority, minute: u32) -> QueueEntry {
        QueueEntry::new(EntryId::new(id))
            .with_priority(priority)
            .with_entered_at(Utc.with_ymd_and_hms(2025, 3, 1, 8, minute, 0).unwrap())
    }

    fn controller(store: &MemoryQueueStore) -> QueueController {
        let cfg = QueueConfig::new(
            "http://clinic.test",
            Duration::from_secs(10),
            Duration::from_secs(8),
        )
        .expect("config");
        let store = Arc::new(store.clone());
        QueueController::new(
            Arc::new(cfg),
            SessionContext::new(Some("nurse-1".into()), None),
            store.clone(),
            store,
        )
    }

    fn ids(snapshot: &QueueSnapshot) -> Vec<u64> {
        snapshot.view.entries().iter().map(|e| e.id.get()).collect()
    }

    #[test]
    fn test_poll_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let first = PollGuard::acquire(&flag).expect("first");
        assert!(PollGuard::acquire(&flag).is_none());
        drop(first);
        assert!(PollGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_apply_prunes_settled_retirements() {
        let mut state = ControllerState::default();
        state.retired.insert(EntryId::new(1), 3);

        // Fetched before the removal was confirmed: still filtered, still retired.
        state.apply(2, vec![entry(1, Priority::High, 1), entry(2, Priority::Normal, 2)]);
        assert_eq!(ids(&state.snapshot), vec![2]);
        assert!(state.retired.contains_key(&EntryId::new(1)));

        // Fetched afterwards without the id: the removal has settled.
        state.apply(4, vec![entry(2, Priority::Normal, 2)]);
        assert!(state.retired.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_applies_snapshot() {
        let store = MemoryQueueStore::with_entries([
            entry(1, Priority::Normal, 1),
            entry(2, Priority::Critical, 2),
        ]);
        let ctl = controller(&store);

        let outcome = ctl.refresh().await.expect("refresh");
        assert_eq!(
            outcome,
            RefreshOutcome::Applied {
                entries: 2,
                serving: Some(EntryId::new(2)),
            }
        );
        let snapshot = ctl.snapshot().await;
        assert_eq!(ids(&snapshot), vec![2, 1]);
        assert!(snapshot.refreshed_at.is_some());
        assert!(!snapshot.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_poll_is_skipped() {
        let store = MemoryQueueStore::with_entries([entry(1, Priority::Normal, 1)]);
        store.delay_next(StoreOperation::Fetch, Duration::from_secs(3));
        let ctl = controller(&store);

        let first = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.refresh_with(RefreshCause::Poll).await }
        });
        tokio::task::yield_now().await;

        let second = ctl.refresh_with(RefreshCause::Poll).await.expect("second poll");
        assert_eq!(second, RefreshOutcome::Skipped);

        // Manual refreshes are not gated by the poll guard.
        let manual = ctl.refresh().await.expect("manual refresh");
        assert!(matches!(manual, RefreshOutcome::Applied { entries: 1, .. }));

        let first = first.await.expect("join").expect("first poll");
        assert_eq!(first, RefreshOutcome::Superseded);
        assert_eq!(store.calls(StoreOperation::Fetch), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_view_and_marks_stale() {
        let store = MemoryQueueStore::with_entries([entry(1, Priority::Normal, 1)]);
        let ctl = controller(&store);
        ctl.refresh().await.expect("first refresh");

        store.fail_next(StoreOperation::Fetch, StoreError::Transport("reset".into()));
        let err = ctl.refresh().await.expect_err("transient failure");
        assert!(matches!(err, QueueError::Fetch(StoreError::Transport(_))));

        let snapshot = ctl.snapshot().await;
        assert_eq!(ids(&snapshot), vec![1]);
        assert!(snapshot.stale);

        ctl.refresh().await.expect("recovered");
        assert!(!ctl.snapshot().await.stale);
    }

    #[tokio::test]
    async fn test_advance_on_empty_queue_is_noop() {
        let store = MemoryQueueStore::new();
        let ctl = controller(&store);
        ctl.refresh().await.expect("refresh");

        assert_eq!(ctl.advance().await.expect("advance"), AdvanceOutcome::NothingToAdvance);
        assert_eq!(ctl.advance().await.expect("advance"), AdvanceOutcome::NothingToAdvance);
        assert_eq!(store.calls(StoreOperation::MarkComplete), 0);
    }

    #[tokio::test]
    async fn test_failed_command_leaves_state_unchanged() {
        let store = MemoryQueueStore::with_entries([
            entry(1, Priority::High, 1),
            entry(2, Priority::Normal, 2),
        ]);
        let ctl = controller(&store);
        ctl.refresh().await.expect("refresh");
        let before = ctl.snapshot().await;

        store.fail_next(
            StoreOperation::MarkComplete,
            StoreError::Status {
                status: 503,
                body: "unavailable".into(),
            },
        );
        let err = ctl.advance().await.expect_err("advance fails");
        assert!(matches!(
            err,
            QueueError::CommandFailed {
                command: QueueCommand::Advance,
                ..
            }
        ));
        assert_eq!(ctl.snapshot().await, before);
        assert_eq!(store.calls(StoreOperation::Fetch), 1);
    }

    #[tokio::test]
    async fn test_commands_refused_after_shutdown() {
        let store = MemoryQueueStore::with_entries([entry(1, Priority::High, 1)]);
        let ctl = controller(&store);
        ctl.refresh().await.expect("refresh");
        ctl.shutdown();

        assert!(matches!(ctl.refresh().await, Err(QueueError::ShutDown)));
        assert!(matches!(ctl.advance().await, Err(QueueError::ShutDown)));
        assert!(matches!(
            ctl.remove(EntryId::new(1)).await,
            Err(QueueError::ShutDown)
        ));
        assert!(store.completed().is_empty());
        // Reads still see the last view.
        assert_eq!(ctl.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_emergency_insert_rejects_malformed_identifier() {
        let store = MemoryQueueStore::new();
        let ctl = controller(&store);
        let err = ctl.emergency_insert("bad id!").await.expect_err("malformed");
        assert!(matches!(err, QueueError::InvalidIdentifier(_)));
        assert_eq!(store.calls(StoreOperation::ResolvePatient), 0);
    }
}
