//! Seams to the authoritative queue store and the priority classifier.
//!
//! Both live behind a remote API. Every operation is fallible and asynchronous, and the
//! controller treats every failure (including timeouts) as "the effect did not happen".

pub mod http;
pub mod memory;

use async_trait::async_trait;
use queue_types::{EntryId, Patient, PatientIdentifier, Priority, QueueEntry};
use queue_wire::WireError;
use std::time::Duration;

pub use http::HttpQueueStore;
pub use memory::{MemoryQueueStore, StoreOperation};

/// Errors returned by store and classifier implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid response: {0}")]
    Decode(#[from] WireError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The authoritative collection of queue entries.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Full replacement snapshot of the queue, in any order.
    async fn fetch_queue(&self) -> StoreResult<Vec<QueueEntry>>;

    /// Mark `id` as served; the store drops it from the queue.
    async fn mark_complete(&self, id: EntryId) -> StoreResult<()>;

    /// Delete `id` from the queue without serving it.
    async fn remove(&self, id: EntryId) -> StoreResult<()>;

    /// Look a patient up in the registry. Unknown identifiers yield [`StoreError::NotFound`].
    async fn resolve_patient(&self, identifier: &PatientIdentifier) -> StoreResult<Patient>;
}

/// External service that assigns priority bands from vitals.
#[async_trait]
pub trait PriorityClassifier: Send + Sync {
    /// Re-evaluate `patient` as an emergency and return the band it now holds upstream.
    async fn reprioritize(&self, patient: &PatientIdentifier) -> StoreResult<Priority>;
}
