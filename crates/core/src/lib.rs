//! # Queue Core
//!
//! Core logic of the clinic patient queue:
//! - priority ordering of queue entries ([`ordering`])
//! - reconciliation of fetched snapshots into a view with a serving pointer ([`reconcile`])
//! - display numbering and free-text filtering ([`view`], [`filter`])
//! - the [`QueueController`] that owns a session's view, runs staff commands and polls
//! - the [`QueueStore`] and [`PriorityClassifier`] seams, with HTTP and in-memory stores
//!
//! **No presentation concerns**: REST routes and the terminal client live in `api-rest` and
//! `queue-cli`. Configuration is resolved by binaries and passed in as [`QueueConfig`].

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod filter;
pub mod ordering;
pub mod reconcile;
pub mod store;
pub mod view;

pub use config::{QueueConfig, SessionContext};
pub use controller::{
    AdvanceOutcome, EmergencyOutcome, PollerHandle, QueueController, RefreshOutcome,
    RemoveOutcome,
};
pub use error::{QueueCommand, QueueError, QueueResult};
pub use store::{
    HttpQueueStore, MemoryQueueStore, PriorityClassifier, QueueStore, StoreError,
    StoreOperation, StoreResult,
};
pub use view::{DisplayNumber, QueueRow, QueueSnapshot, QueueView};

pub use queue_types::{
    EntryId, Patient, PatientIdentifier, Priority, QueueEntry, VitalsDisplay, VitalsSnapshot,
    PLACEHOLDER,
};
