//! Queue entries.
//!
//! An entry's domain fields are owned upstream: the queue only reads them. Its display
//! number is positional and is derived from the current ordering, so it is not a field.

use crate::patient::UNKNOWN_PATIENT_NAME;
use crate::{EntryId, Patient, Priority, VitalsSnapshot, PLACEHOLDER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One patient enrolled in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    /// `None` when the store returned the entry without its patient record.
    pub patient: Option<Patient>,
    pub vitals: VitalsSnapshot,
    /// `None` when the classifier has not assigned a band yet.
    pub priority: Option<Priority>,
    /// Enrollment time, the FIFO tie-break within a priority band.
    pub entered_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Creates an entry with no patient, vitals, priority or timestamp attached.
    pub fn new(id: EntryId) -> Self {
        Self {
            id,
            patient: None,
            vitals: VitalsSnapshot::default(),
            priority: None,
            entered_at: None,
        }
    }

    pub fn with_patient(mut self, patient: Patient) -> Self {
        self.patient = Some(patient);
        self
    }

    pub fn with_vitals(mut self, vitals: VitalsSnapshot) -> Self {
        self.vitals = vitals;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_entered_at(mut self, entered_at: DateTime<Utc>) -> Self {
        self.entered_at = Some(entered_at);
        self
    }

    /// Priority used for ordering; a missing band counts as [`Priority::Normal`].
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }

    /// Registry identifier of the patient, or the placeholder when absent.
    pub fn patient_identifier(&self) -> &str {
        self.patient
            .as_ref()
            .map(|p| p.identifier.as_str())
            .filter(|id| !id.is_empty())
            .unwrap_or(PLACEHOLDER)
    }

    pub fn display_name(&self) -> String {
        self.patient
            .as_ref()
            .map(Patient::display_name)
            .unwrap_or_else(|| UNKNOWN_PATIENT_NAME.to_string())
    }
}
