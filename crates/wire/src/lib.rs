//! Wire/boundary support for the remote clinic queue API.
//!
//! This crate provides **wire models** and **translation helpers** for the JSON the
//! clinic backend serves and accepts:
//! - the current-queue batch (`GET /queue/current_queue/`)
//! - patient records (`GET /patients/{identifier}/`)
//! - the priority hand-off for emergency escalation (`POST /queue/prioritize/`)
//!
//! Wire structs are private. Callers only see the domain types from `queue-types`.
//! Schema mismatches are reported with the path of the offending field.

pub mod patient_record;
pub mod prioritize;
pub mod queue;

mod measurement;

// Re-export facades
pub use patient_record::PatientRecord;
pub use prioritize::Prioritize;
pub use queue::CurrentQueue;

/// Errors returned by the `queue-wire` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`WireError`].
pub type WireResult<T> = Result<T, WireError>;

/// Deserialize `json_text` into `T`, naming the failing field path on mismatch.
pub(crate) fn parse_with_path<T>(json_text: &str, what: &str) -> WireResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let mut deserializer = serde_json::Deserializer::from_str(json_text);
    match serde_path_to_error::deserialize::<_, T>(&mut deserializer) {
        Ok(parsed) => {
            deserializer.end()?;
            Ok(parsed)
        }
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(WireError::Translation(format!(
                "{what} schema mismatch at {path}: {source}"
            )))
        }
    }
}
