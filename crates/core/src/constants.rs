//! Constants used throughout the queue core crate.
//!
//! Remote endpoint paths and configuration defaults live here so the HTTP store,
//! the binaries and the tests agree on them.

use std::time::Duration;

/// Default base URL of the clinic backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default interval between queue polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default per-request timeout for polls and commands.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Path of the current-queue snapshot endpoint.
pub const CURRENT_QUEUE_PATH: &str = "/queue/current_queue/";

/// Path of the priority hand-off endpoint used for emergencies.
pub const PRIORITIZE_PATH: &str = "/queue/prioritize/";

/// Header carrying the staff session token.
pub const SESSION_TOKEN_HEADER: &str = "Authorization";

/// Zero-padded width of display numbers (`001`).
pub const DISPLAY_NUMBER_WIDTH: usize = 3;

/// Path of the mark-complete endpoint for one entry.
pub fn mark_complete_path(id: queue_types::EntryId) -> String {
    format!("/queue/{id}/mark_complete/")
}

/// Path of a single queue entry resource.
pub fn entry_path(id: queue_types::EntryId) -> String {
    format!("/queue/{id}/")
}

/// Path of a single patient record.
pub fn patient_path(identifier: &queue_types::PatientIdentifier) -> String {
    format!("/patients/{identifier}/")
}
