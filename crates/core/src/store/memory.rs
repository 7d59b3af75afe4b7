//! In-process store for tests, demos and offline runs.
//!
//! Holds the queue and patient registry in memory, applies the same effects the clinic
//! backend would, and lets callers script failures and latency per operation.

use super::{PriorityClassifier, QueueStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use queue_types::{EntryId, Patient, PatientIdentifier, Priority, QueueEntry};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Store operations that can have failures or latency scripted against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Fetch,
    MarkComplete,
    Remove,
    ResolvePatient,
    Reprioritize,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: Vec<QueueEntry>,
    patients: HashMap<String, Patient>,
    next_id: u64,
    emergency_priority: Option<Priority>,
    failures: HashMap<StoreOperation, VecDeque<StoreError>>,
    delays: HashMap<StoreOperation, VecDeque<Duration>>,
    calls: HashMap<StoreOperation, usize>,
    completed: Vec<EntryId>,
}

impl MemoryState {
    /// Count the call and pop any scripted failure and delay for it.
    fn begin(&mut self, op: StoreOperation) -> (Option<Duration>, Option<StoreError>) {
        *self.calls.entry(op).or_default() += 1;
        let delay = self.delays.get_mut(&op).and_then(VecDeque::pop_front);
        let failure = self.failures.get_mut(&op).and_then(VecDeque::pop_front);
        (delay, failure)
    }

    fn take_entry(&mut self, id: EntryId) -> StoreResult<QueueEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("queue entry {id}")))?;
        Ok(self.entries.remove(index))
    }
}

/// Queue store and classifier held entirely in memory.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = QueueEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            store.insert(entry);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace an entry upstream. Its patient, if any, is registered too.
    pub fn insert(&self, entry: QueueEntry) {
        let mut state = self.lock();
        state.next_id = state.next_id.max(entry.id.get());
        if let Some(patient) = &entry.patient {
            state
                .patients
                .insert(patient.identifier.clone(), patient.clone());
        }
        match state.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => state.entries.push(entry),
        }
    }

    /// Register a patient without enrolling them in the queue.
    pub fn register_patient(&self, patient: Patient) {
        self.lock()
            .patients
            .insert(patient.identifier.clone(), patient);
    }

    /// Change an entry's band upstream, as the classifier would after new vitals.
    pub fn set_priority(&self, id: EntryId, priority: Priority) {
        if let Some(entry) = self.lock().entries.iter_mut().find(|e| e.id == id) {
            entry.priority = Some(priority);
        }
    }

    /// Drop an entry upstream without going through a command.
    pub fn discard(&self, id: EntryId) {
        self.lock().entries.retain(|e| e.id != id);
    }

    /// Band the classifier assigns on emergency insertion. Defaults to
    /// [`Priority::Critical`].
    pub fn set_emergency_priority(&self, priority: Priority) {
        self.lock().emergency_priority = Some(priority);
    }

    /// Make the next call to `op` fail with `error`. Calls queue up in order.
    pub fn fail_next(&self, op: StoreOperation, error: StoreError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Make the next call to `op` take `delay` before answering.
    ///
    /// A delayed fetch answers with the queue as it was when the call started. A delayed
    /// command applies its effect only once the delay has elapsed.
    pub fn delay_next(&self, op: StoreOperation, delay: Duration) {
        self.lock().delays.entry(op).or_default().push_back(delay);
    }

    pub fn calls(&self, op: StoreOperation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or_default()
    }

    /// Ids marked complete, in order.
    pub fn completed(&self) -> Vec<EntryId> {
        self.lock().completed.clone()
    }

    /// Current upstream queue, in insertion order.
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.lock().entries.clone()
    }

    async fn pause(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run a command: wait out any scripted delay, then fail or apply `effect`.
    async fn command<T>(
        &self,
        op: StoreOperation,
        effect: impl FnOnce(&mut MemoryState) -> StoreResult<T> + Send,
    ) -> StoreResult<T> {
        let (delay, failure) = self.lock().begin(op);
        Self::pause(delay).await;
        if let Some(error) = failure {
            return Err(error);
        }
        effect(&mut self.lock())
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn fetch_queue(&self) -> StoreResult<Vec<QueueEntry>> {
        let (delay, result) = {
            let mut state = self.lock();
            let (delay, failure) = state.begin(StoreOperation::Fetch);
            let result = match failure {
                Some(error) => Err(error),
                None => Ok(state.entries.clone()),
            };
            (delay, result)
        };
        Self::pause(delay).await;
        result
    }

    async fn mark_complete(&self, id: EntryId) -> StoreResult<()> {
        self.command(StoreOperation::MarkComplete, |state| {
            state.take_entry(id)?;
            state.completed.push(id);
            Ok(())
        })
        .await
    }

    async fn remove(&self, id: EntryId) -> StoreResult<()> {
        self.command(StoreOperation::Remove, |state| {
            state.take_entry(id).map(|_| ())
        })
        .await
    }

    async fn resolve_patient(&self, identifier: &PatientIdentifier) -> StoreResult<Patient> {
        let key = identifier.as_str().to_string();
        self.command(StoreOperation::ResolvePatient, move |state| {
            state
                .patients
                .get(&key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("patient {key}")))
        })
        .await
    }
}

#[async_trait]
impl PriorityClassifier for MemoryQueueStore {
    /// Escalate the patient's queued entry, or enroll them if they are not queued.
    async fn reprioritize(&self, patient: &PatientIdentifier) -> StoreResult<Priority> {
        let key = patient.as_str().to_string();
        self.command(StoreOperation::Reprioritize, move |state| {
            let priority = state.emergency_priority.unwrap_or(Priority::Critical);
            let queued = state.entries.iter_mut().find(|e| {
                e.patient
                    .as_ref()
                    .is_some_and(|p| p.identifier == key)
            });
            if let Some(entry) = queued {
                entry.priority = Some(priority);
                return Ok(priority);
            }

            let record = state
                .patients
                .get(&key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("patient {key}")))?;
            state.next_id += 1;
            let entry = QueueEntry::new(EntryId::new(state.next_id))
                .with_patient(record)
                .with_priority(priority)
                .with_entered_at(Utc::now());
            state.entries.push(entry);
            Ok(priority)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(id: &str) -> Patient {
        Patient::new(id, "Test", id)
    }

    fn identifier(id: &str) -> PatientIdentifier {
        PatientIdentifier::new(id).expect("valid identifier")
    }

    #[tokio::test]
    async fn test_mark_complete_removes_and_records() {
        let store = MemoryQueueStore::with_entries([
            QueueEntry::new(EntryId::new(1)),
            QueueEntry::new(EntryId::new(2)),
        ]);
        store.mark_complete(EntryId::new(1)).await.expect("complete");
        assert_eq!(store.completed(), vec![EntryId::new(1)]);
        assert_eq!(store.entries().len(), 1);

        let err = store
            .mark_complete(EntryId::new(1))
            .await
            .expect_err("already gone");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scripted_failure_is_consumed_once() {
        let store = MemoryQueueStore::with_entries([QueueEntry::new(EntryId::new(1))]);
        store.fail_next(StoreOperation::Fetch, StoreError::Transport("down".into()));

        assert!(store.fetch_queue().await.is_err());
        assert_eq!(store.fetch_queue().await.expect("second fetch").len(), 1);
        assert_eq!(store.calls(StoreOperation::Fetch), 2);
    }

    #[tokio::test]
    async fn test_failed_command_has_no_effect() {
        let store = MemoryQueueStore::with_entries([QueueEntry::new(EntryId::new(1))]);
        store.fail_next(
            StoreOperation::Remove,
            StoreError::Status {
                status: 500,
                body: "boom".into(),
            },
        );
        assert!(store.remove(EntryId::new(1)).await.is_err());
        assert_eq!(store.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_reprioritize_escalates_queued_patient() {
        let store = MemoryQueueStore::with_entries([QueueEntry::new(EntryId::new(4))
            .with_patient(patient("P-1"))
            .with_priority(Priority::Normal)]);

        let band = store.reprioritize(&identifier("P-1")).await.expect("classify");
        assert_eq!(band, Priority::Critical);
        assert_eq!(store.entries()[0].priority, Some(Priority::Critical));
        assert_eq!(store.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_reprioritize_enrolls_registered_patient() {
        let store = MemoryQueueStore::with_entries([QueueEntry::new(EntryId::new(4))]);
        store.register_patient(patient("P-9"));
        store.set_emergency_priority(Priority::High);

        let band = store.reprioritize(&identifier("P-9")).await.expect("classify");
        assert_eq!(band, Priority::High);
        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id, EntryId::new(5));
        assert!(entries[1].entered_at.is_some());
    }

    #[tokio::test]
    async fn test_resolve_unknown_patient() {
        let store = MemoryQueueStore::new();
        let err = store
            .resolve_patient(&identifier("NOPE"))
            .await
            .expect_err("unknown");
        assert!(matches!(err, StoreError::NotFound(msg) if msg.contains("NOPE")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_fetch_answers_with_queue_at_call_start() {
        let store = MemoryQueueStore::with_entries([QueueEntry::new(EntryId::new(1))]);
        store.delay_next(StoreOperation::Fetch, Duration::from_secs(3));

        let slow = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_queue().await }
        });
        tokio::task::yield_now().await;
        store.insert(QueueEntry::new(EntryId::new(2)));

        let batch = slow.await.expect("join").expect("fetch");
        assert_eq!(batch.len(), 1);
    }
}
