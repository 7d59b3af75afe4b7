//! Read-only patient reference copies.
//!
//! The patient registry owns these records; a queue entry only embeds the copy it
//! was served with on the last refresh.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Name shown for an entry whose patient record could not be attached.
pub const UNKNOWN_PATIENT_NAME: &str = "UNKNOWN";

/// Identity attributes of a registered patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    /// Registry identifier, unique and stable.
    pub identifier: String,
    pub first_name: String,
    pub last_name: String,
    pub sex: Option<String>,
    pub contact: Option<String>,
    pub address: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

impl Patient {
    /// Creates a patient reference with only the identity and name populated.
    pub fn new(
        identifier: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            sex: None,
            contact: None,
            address: None,
            birthdate: None,
        }
    }

    /// Upper-cased `FIRST LAST`, or [`UNKNOWN_PATIENT_NAME`] when both are blank.
    pub fn display_name(&self) -> String {
        let joined = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let joined = joined.trim();
        if joined.is_empty() {
            UNKNOWN_PATIENT_NAME.to_string()
        } else {
            joined.to_uppercase()
        }
    }
}
