//! # Queue Types
//!
//! Domain leaf types shared by every clinic-queue crate:
//! - [`EntryId`] and [`PatientIdentifier`] identity newtypes
//! - [`Patient`] reference copies held by queue entries
//! - [`VitalsSnapshot`] measurements and their display rendering
//! - [`Priority`] classification bands
//! - [`QueueEntry`] the unit the queue orders
//!
//! These types carry no I/O. Wire translation lives in `queue-wire`; ordering and
//! reconciliation live in `queue-core`.

pub mod entry;
pub mod ids;
pub mod patient;
pub mod priority;
pub mod vitals;

pub use entry::QueueEntry;
pub use ids::{EntryId, PatientIdentifier};
pub use patient::Patient;
pub use priority::Priority;
pub use vitals::{VitalsDisplay, VitalsSnapshot};

/// Placeholder rendered wherever a value was not captured.
pub const PLACEHOLDER: &str = "—";

/// Errors that can occur when constructing validated domain values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// The input text was empty or contained only whitespace
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    /// The patient identifier contained characters outside the accepted set
    #[error("patient identifier contains invalid characters: {0}")]
    InvalidIdentifier(String),
    /// The patient identifier exceeded the maximum length
    #[error("patient identifier exceeds maximum length of {max} characters")]
    IdentifierTooLong { max: usize },
    /// A priority label did not name a known band
    #[error("unknown priority: {0}")]
    UnknownPriority(String),
}

/// Type alias for Results that can fail with a [`TypesError`].
pub type TypesResult<T> = Result<T, TypesError>;
