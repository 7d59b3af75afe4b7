//! Emergency priority hand-off wire model.
//!
//! The queue does not classify patients. For an emergency it asks the classifier to
//! re-evaluate a patient and reads back the band it assigned.

use crate::{parse_with_path, WireError, WireResult};
use queue_types::{PatientIdentifier, Priority};
use serde::{Deserialize, Serialize};

/// Priority hand-off operations.
pub struct Prioritize;

impl Prioritize {
    /// Render the request body for `POST /queue/prioritize/`.
    pub fn render_request(patient: &PatientIdentifier) -> WireResult<String> {
        let wire = PrioritizeRequestWire {
            patient_id: patient.as_str(),
            emergency: true,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse the classifier's reply into the assigned band.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Translation`] if the reply does not match the schema or names
    /// an unknown band.
    pub fn parse_response(json_text: &str) -> WireResult<Priority> {
        let wire: PrioritizeResponseWire = parse_with_path(json_text, "Prioritize response")?;
        wire.priority
            .parse::<Priority>()
            .map_err(|e| WireError::Translation(format!("Prioritize response: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct PrioritizeRequestWire<'a> {
    patient_id: &'a str,
    emergency: bool,
}

#[derive(Debug, Deserialize)]
struct PrioritizeResponseWire {
    priority: String,
}
